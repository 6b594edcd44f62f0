mod billing_entry;

pub use billing_entry::*;
