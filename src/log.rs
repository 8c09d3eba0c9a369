use std::sync::Mutex;

use lazy_static::lazy_static;

lazy_static! {
    static ref VERBOSE: Mutex<bool> = Mutex::new(false);
}

pub fn set_verbose(verbose: bool) {
    *VERBOSE.lock().unwrap() = verbose;
}

pub fn get_verbose() -> bool {
    *VERBOSE.lock().unwrap()
}

#[macro_export]
macro_rules! verboseln {
    ($($arg:tt)*) => {{
        if $crate::log::get_verbose() {
            eprintln!($($arg)*);
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_verboseln() {
        // Off by default; must not print.
        verboseln!("something {}", 1);
    }
}
