//! Injectable locations of an HTTP message
//!
//! Each variant understands one encoding. `set_message` extracts the
//! parameters it finds, in discovery order, replacing whatever the previous
//! call extracted. The two injection methods rewrite the live message at
//! the occurrence identified by the pair's position and return the
//! fragment that was written, which plugins use as evidence.
//!
//! `set_parameter` escapes the value for the encoding first;
//! `set_escaped_parameter` writes it verbatim.

mod cookie;
mod custom;
mod factory;
mod form_query;
mod header;
mod json;
mod multipart;
mod odata;
mod query;
mod url_path;
mod url_query;
mod user_defined;

pub use cookie::CookieVariant;
pub use custom::CustomVariant;
pub use factory::{VariantConstructor, VariantFactory};
pub use form_query::FormQueryVariant;
pub use header::{HeaderVariant, NON_INJECTABLE_HEADERS};
pub use json::JsonVariant;
pub use multipart::MultipartVariant;
pub use odata::{ODataFilterVariant, ODataIdVariant};
pub use query::QueryCodec;
pub use url_path::UrlPathVariant;
pub use url_query::UrlQueryVariant;
pub use user_defined::UserDefinedVariant;

use super::name_value_pair::NameValuePair;
use crate::http::HttpMessage;

pub trait Variant: Send + Sync {
    /// Short identifier used in logs
    fn short_name(&self) -> &'static str;

    /// Extract the parameters of `msg`
    fn set_message(&mut self, msg: &HttpMessage);

    /// Parameters found by the last `set_message`
    fn param_list(&self) -> &[NameValuePair];

    /// Inject an unescaped name/value
    fn set_parameter(
        &self,
        msg: &mut HttpMessage,
        original: &NameValuePair,
        name: Option<&str>,
        value: Option<&str>,
    ) -> Option<String>;

    /// Inject a name/value that is already escaped for the encoding
    fn set_escaped_parameter(
        &self,
        msg: &mut HttpMessage,
        original: &NameValuePair,
        name: Option<&str>,
        value: Option<&str>,
    ) -> Option<String>;

    /// Leaf name shown for `msg` in the site tree, when the variant defines one
    fn leaf_name(&self, _node_name: &str, _msg: &HttpMessage) -> Option<String> {
        None
    }

    /// Tree path of `msg`, when the variant defines one
    fn tree_path(&self, _msg: &HttpMessage) -> Option<Vec<String>> {
        None
    }
}
