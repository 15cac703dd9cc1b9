#![forbid(unsafe_code)]

use proc_macro::TokenStream;

mod record;
mod util;


/// See the documentation of the `Record` trait for details.
#[proc_macro_derive(Record, attributes(upsert))]
pub fn derive_record(ts: TokenStream) -> TokenStream {
    util::expand(ts, record::expand)
}
