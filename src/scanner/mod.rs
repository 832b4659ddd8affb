//! Active scan engine
//!
//! A [`Scanner`] walks the site tree host by host. Every host gets a
//! [`HostProcess`] that runs the plugins of a [`plugin::PluginFactory`] in
//! dependency and risk order. Plugins inject payloads through the
//! [`variant`] implementations and report [`Alert`]s.

mod alert;
mod analyser;
mod control;
mod engine;
mod filter;
mod host_process;
mod kb;
mod name_value_pair;
mod param;
pub mod active;
pub mod plugin;
pub mod policies;
pub mod variant;


pub use alert::{Alert, AlertBuilder, AlertSink, Confidence, Risk, MAX_ALERT_REF_LENGTH};
pub use analyser::{path_regex, Analyser};
pub use control::{ScanControl, ScanState};
pub use engine::{ScanProgress, Scanner, ScannerListener};
pub use filter::{FilterResult, MethodFilter, ScanFilter, UrlRegexFilter};
pub use host_process::{HostProcess, PluginStats, ScannerParent, SKIP_NO_NODES, SKIP_TECH};
pub use kb::Kb;
pub use name_value_pair::{NameValuePair, ParamKind};
pub use param::{
    ExcludedParam, InjectableTargets, InjectionRange, ParamExclusions, RangeLocation, RpcTargets,
    ScannerParam,
};
pub use policies::ScanPolicy;
