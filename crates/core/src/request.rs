//! Per-request context handed to strategy hooks.

use serde::{Deserialize, Serialize};

pub use kube::core::GroupVersion;

pub const EXTENSIONS_GROUP: &str = "extensions";
pub const APPS_GROUP: &str = "apps";

/// Build a group/version pair; `group` is empty for the core group.
pub fn group_version(group: &str, version: &str) -> GroupVersion {
    GroupVersion { group: group.to_string(), version: version.to_string() }
}

/// `extensions/v1beta1`
pub fn extensions_v1beta1() -> GroupVersion {
    group_version(EXTENSIONS_GROUP, "v1beta1")
}

/// `apps/v1beta2`
pub fn apps_v1beta2() -> GroupVersion {
    group_version(APPS_GROUP, "v1beta2")
}

/// Parse `group/version` or a bare core `version`.
pub fn parse_group_version(s: &str) -> Option<GroupVersion> {
    let s = s.trim();
    match s.split('/').collect::<Vec<_>>().as_slice() {
        [version] if !version.is_empty() => Some(group_version("", version)),
        [group, version] if !group.is_empty() && !version.is_empty() => Some(group_version(group, version)),
        _ => None,
    }
}

/// Render as `group/version` (or `version` for the core group).
pub fn display_group_version(gv: &GroupVersion) -> String {
    if gv.group.is_empty() {
        gv.version.clone()
    } else {
        format!("{}/{}", gv.group, gv.version)
    }
}

/// Which API the request arrived under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestInfo {
    pub api_group: String,
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subresource: Option<String>,
}

impl RequestInfo {
    pub fn new(gv: &GroupVersion) -> Self {
        Self { api_group: gv.group.clone(), api_version: gv.version.clone(), subresource: None }
    }

    pub fn group_version(&self) -> GroupVersion {
        group_version(&self.api_group, &self.api_version)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub namespace: Option<String>,
    request_info: Option<RequestInfo>,
}

impl RequestContext {
    /// Context without request info, as used by internal callers.
    pub fn internal() -> Self {
        Self::default()
    }

    pub fn for_group_version(gv: &GroupVersion) -> Self {
        Self { namespace: None, request_info: Some(RequestInfo::new(gv)) }
    }

    pub fn with_request_info(mut self, info: RequestInfo) -> Self {
        self.request_info = Some(info);
        self
    }

    pub fn with_namespace(mut self, ns: &str) -> Self {
        self.namespace = Some(ns.to_string());
        self
    }

    pub fn request_info(&self) -> Option<&RequestInfo> {
        self.request_info.as_ref()
    }
}
