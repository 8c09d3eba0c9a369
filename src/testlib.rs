use std::fmt::Debug;

use regex::Regex;

pub fn assert_re(pattern: &str, haystack: &str) {
    let re = Regex::new(pattern).unwrap();
    assert!(
        re.is_match(haystack),
        "{:?} did not match {:?}",
        haystack,
        re
    );
}

pub fn assert_vec_eq<T: PartialEq + Debug>(left: Vec<T>, right: Vec<T>) {
    assert_eq!(left, right, "\n left: {:#?}\nright: {:#?}", left, right);
}

// For large nested structs, the pretty (#) repr makes failures legible.
pub fn assert_big_struct_eq<T: PartialEq + Debug>(left: T, right: T) {
    assert_eq!(left, right, "\n left: {:#?}\nright: {:#?}", left, right);
}
