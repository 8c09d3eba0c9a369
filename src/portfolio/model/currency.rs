use std::fmt::Display;

#[derive(Clone, Debug)]
enum CurrencyRepr {
    Static(&'static str),
    Owned(String),
}

/// An ISO-ish currency code. The portfolio's local currency is CAD; an empty
/// code means "the default", which is equivalent to CAD everywhere in the
/// superficial-loss and ACB rules encoded here.
#[derive(Clone, Debug)]
pub struct Currency(CurrencyRepr);

impl Currency {
    pub fn new(code: &str) -> Currency {
        match code.trim().to_uppercase().as_str() {
            "" => Currency::default(),
            "CAD" => Currency::cad(),
            "USD" => Currency::usd(),
            other => Currency(CurrencyRepr::Owned(other.to_string())),
        }
    }

    pub fn cad() -> Currency {
        Currency(CurrencyRepr::Static("CAD"))
    }

    pub fn usd() -> Currency {
        Currency(CurrencyRepr::Static("USD"))
    }

    pub fn is_default(&self) -> bool {
        *self == Currency::default()
    }

    pub fn as_str(&self) -> &str {
        match &self.0 {
            CurrencyRepr::Static(s) => s,
            CurrencyRepr::Owned(s) => s.as_str(),
        }
    }
}

impl Default for Currency {
    fn default() -> Currency {
        Currency::cad()
    }
}

impl PartialEq for Currency {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Currency {}

impl std::hash::Hash for Currency {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Currency;

    #[test]
    fn test_currency_equality() {
        assert_eq!(Currency::new("cad"), Currency::cad());
        assert_eq!(Currency::new("Cad"), Currency::cad());
        assert_eq!(Currency::new(""), Currency::cad());
        assert_eq!(Currency::new("rmb"), Currency::new("RMB"));
        assert_ne!(Currency::cad(), Currency::usd());
    }

    #[test]
    fn test_default() {
        assert!(Currency::cad().is_default());
        assert!(Currency::new("").is_default());
        assert!(!Currency::usd().is_default());
        assert_eq!(Currency::default().as_str(), "CAD");
    }
}
