// String-typed error for the IO and parsing edges, where the only recourse
// is to surface the message to the user.
pub type SError = String;
