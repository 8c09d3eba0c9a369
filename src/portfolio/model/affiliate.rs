use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use lazy_static::lazy_static;
use regex::Regex;

use crate::portfolio::model::errors::AcbError;

lazy_static! {
    static ref REGISTERED_MARKER_RE: Regex = Regex::new(r"\([rR]\)").unwrap();
    static ref MULTI_SPACE_RE: Regex = Regex::new(r"  +").unwrap();
}

#[derive(PartialEq, Eq, Debug)]
struct AffiliateData {
    id: String,
    name: String,
    registered: bool,
}

impl AffiliateData {
    // `raw_name` must already have any "(R)" marker stripped.
    fn build(raw_name: &str, registered: bool) -> AffiliateData {
        let mut name =
            MULTI_SPACE_RE.replace_all(raw_name, " ").trim().to_string();
        if name.is_empty() {
            name = "Default".to_string();
        }
        let mut id = name.to_lowercase();
        if registered {
            id += " (R)";
            name += " (R)";
        }
        AffiliateData {
            id,
            name,
            registered,
        }
    }

    /// Parses a user-entered affiliate label. A "(R)" marker anywhere in the
    /// label makes the affiliate registered; an empty or whitespace label is
    /// the default affiliate.
    fn from_label(label: &str) -> AffiliateData {
        let registered = REGISTERED_MARKER_RE.is_match(label);
        if registered {
            let stripped = REGISTERED_MARKER_RE.replace_all(label, " ");
            AffiliateData::build(&stripped, true)
        } else {
            AffiliateData::build(label, false)
        }
    }
}

/// A single holding account. Instances are deduplicated process-wide by
/// canonical id, so cloning is an Arc bump and equality is cheap.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Affiliate(Arc<AffiliateData>);

impl Affiliate {
    pub fn from_label(s: &str) -> Affiliate {
        AffiliateRegistry::global().get_or_create_from_label(s)
    }

    pub fn default() -> Affiliate {
        Affiliate::from_label("")
    }

    pub fn default_registered() -> Affiliate {
        Affiliate::from_label("(R)")
    }

    pub fn id(&self) -> &str {
        self.0.id.as_str()
    }

    pub fn name(&self) -> &str {
        self.0.name.as_str()
    }

    pub fn registered(&self) -> bool {
        self.0.registered
    }

    /// Exactly one affiliate is the default: the unnamed, non-registered one.
    pub fn is_default(&self) -> bool {
        self.0.id == "default"
    }
}

impl std::hash::Hash for Affiliate {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

/// Process-wide insert-only table of affiliates, keyed by canonical id.
pub struct AffiliateRegistry {
    by_id: HashMap<String, Affiliate>,
}

lazy_static! {
    static ref GLOBAL_REGISTRY: Mutex<AffiliateRegistry> =
        Mutex::new(AffiliateRegistry::new());
}

impl AffiliateRegistry {
    pub fn new() -> AffiliateRegistry {
        AffiliateRegistry {
            by_id: HashMap::new(),
        }
    }

    pub fn global() -> MutexGuard<'static, AffiliateRegistry> {
        GLOBAL_REGISTRY.lock().unwrap()
    }

    pub fn get_or_create(&mut self, name: &str, registered: bool) -> Affiliate {
        self.intern(AffiliateData::build(name, registered))
    }

    pub fn get_or_create_from_label(&mut self, label: &str) -> Affiliate {
        self.intern(AffiliateData::from_label(label))
    }

    fn intern(&mut self, data: AffiliateData) -> Affiliate {
        match self.by_id.get(data.id.as_str()) {
            Some(af) => af.clone(),
            None => {
                let af = Affiliate(Arc::new(data));
                self.by_id.insert(af.id().to_string(), af.clone());
                af
            }
        }
    }

    pub fn must_get(&self, id: &str) -> Result<Affiliate, AcbError> {
        self.by_id
            .get(id)
            .cloned()
            .ok_or_else(|| AcbError::UnknownAffiliate { id: id.to_string() })
    }

    pub fn default_affiliate(&mut self) -> Affiliate {
        self.get_or_create("", false)
    }
}
