//! Field validation rules for DaemonSets.

use std::collections::BTreeMap;

use flotilla_core::{semantic_eq, DaemonSet, DaemonSetSpec, ErrorList, FieldError, FieldPath};
use k8s_openapi::api::apps::v1::{DaemonSetStatus, DaemonSetUpdateStrategy};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use once_cell::sync::Lazy;
use regex::Regex;

const DNS1123_LABEL_MAX: usize = 63;
const DNS1123_SUBDOMAIN_MAX: usize = 253;

static DNS1123_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("dns-1123 label pattern"));
static DNS1123_SUBDOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").expect("dns-1123 subdomain pattern")
});
static PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]+)%$").expect("percent pattern"));

const SELECTOR_OPERATORS: [&str; 4] = ["In", "NotIn", "Exists", "DoesNotExist"];
const UPDATE_STRATEGY_TYPES: [&str; 2] = ["RollingUpdate", "OnDelete"];

/// Field validation the strategies delegate to.
pub trait Rules: Send + Sync {
    fn validate(&self, ds: &DaemonSet) -> ErrorList;
    fn validate_update(&self, new: &DaemonSet, old: &DaemonSet) -> ErrorList;
    fn validate_status_update(&self, new: &DaemonSet, old: &DaemonSet) -> ErrorList;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl Rules for StandardRules {
    fn validate(&self, ds: &DaemonSet) -> ErrorList {
        let mut errs = validate_object_meta(&ds.metadata, &FieldPath::new("metadata"));
        errs.extend(validate_spec(&ds.spec, &FieldPath::new("spec")));
        errs
    }

    fn validate_update(&self, new: &DaemonSet, old: &DaemonSet) -> ErrorList {
        let mut errs = validate_object_meta(&new.metadata, &FieldPath::new("metadata"));
        errs.extend(validate_object_meta_update(&new.metadata, &old.metadata, &FieldPath::new("metadata")));
        errs.extend(validate_spec_update(&new.spec, &old.spec, &FieldPath::new("spec")));
        errs.extend(validate_spec(&new.spec, &FieldPath::new("spec")));
        errs
    }

    fn validate_status_update(&self, new: &DaemonSet, old: &DaemonSet) -> ErrorList {
        let mut errs = validate_object_meta_update(&new.metadata, &old.metadata, &FieldPath::new("metadata"));
        errs.extend(validate_status(&new.status, &FieldPath::new("status")));
        errs
    }
}

fn validate_object_meta(meta: &ObjectMeta, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    match meta.name.as_deref() {
        None | Some("") => errs.push(FieldError::required(path.child("name"), "name is required")),
        Some(name) => {
            if name.len() > DNS1123_SUBDOMAIN_MAX || !DNS1123_SUBDOMAIN.is_match(name) {
                errs.push(FieldError::invalid(
                    path.child("name"),
                    name,
                    "a DNS-1123 subdomain must consist of lower case alphanumeric characters, '-' or '.'",
                ));
            }
        }
    }
    match meta.namespace.as_deref() {
        None | Some("") => errs.push(FieldError::required(path.child("namespace"), "")),
        Some(ns) => {
            if ns.len() > DNS1123_LABEL_MAX || !DNS1123_LABEL.is_match(ns) {
                errs.push(FieldError::invalid(
                    path.child("namespace"),
                    ns,
                    "a DNS-1123 label must consist of lower case alphanumeric characters or '-'",
                ));
            }
        }
    }
    errs
}

fn validate_object_meta_update(new: &ObjectMeta, old: &ObjectMeta, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    if new.name != old.name {
        errs.push(FieldError::invalid(path.child("name"), &new.name, "field is immutable"));
    }
    if new.namespace != old.namespace {
        errs.push(FieldError::invalid(path.child("namespace"), &new.namespace, "field is immutable"));
    }
    errs
}

fn validate_spec(spec: &DaemonSetSpec, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let selector_path = path.child("selector");
    match &spec.selector {
        None => errs.push(FieldError::required(selector_path, "")),
        Some(sel) if selector_is_empty(sel) => {
            errs.push(FieldError::invalid(selector_path, sel, "empty selector is invalid for daemonset"));
        }
        Some(sel) => {
            let selector_errs = validate_label_selector(sel, &selector_path);
            let labels = spec.template.metadata.as_ref().and_then(|m| m.labels.as_ref());
            if selector_errs.is_empty() && !selector_matches(sel, labels) {
                errs.push(FieldError::invalid(
                    path.child("template").child("metadata").child("labels"),
                    &labels,
                    "`selector` does not match template `labels`",
                ));
            }
            errs.extend(selector_errs);
        }
    }

    let pod_path = path.child("template").child("spec");
    let containers = spec.template.spec.as_ref().map(|s| s.containers.as_slice()).unwrap_or_default();
    if containers.is_empty() {
        errs.push(FieldError::required(pod_path.child("containers"), ""));
    }
    for (i, c) in containers.iter().enumerate() {
        let cpath = pod_path.child("containers").index(i);
        if c.name.is_empty() {
            errs.push(FieldError::required(cpath.child("name"), ""));
        }
        if c.image.as_deref().unwrap_or("").is_empty() {
            errs.push(FieldError::required(cpath.child("image"), ""));
        }
    }
    if let Some(pod) = spec.template.spec.as_ref() {
        if let Some(policy) = pod.restart_policy.as_deref() {
            if policy != "Always" {
                errs.push(FieldError::not_supported(pod_path.child("restartPolicy"), policy, &["Always"]));
            }
        }
        if pod.active_deadline_seconds.is_some() {
            errs.push(FieldError::forbidden(
                pod_path.child("activeDeadlineSeconds"),
                "activeDeadlineSeconds in DaemonSet is not Supported",
            ));
        }
    }

    errs.extend(validate_non_negative(spec.min_ready_seconds.into(), &path.child("minReadySeconds")));
    errs.extend(validate_non_negative(spec.template_generation, &path.child("templateGeneration")));
    if let Some(limit) = spec.revision_history_limit {
        errs.extend(validate_non_negative(limit.into(), &path.child("revisionHistoryLimit")));
    }
    if let Some(strategy) = &spec.update_strategy {
        errs.extend(validate_update_strategy(strategy, &path.child("updateStrategy")));
    }
    errs
}

fn validate_spec_update(new: &DaemonSetSpec, old: &DaemonSetSpec, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let tg_path = path.child("templateGeneration");
    if new.template_generation < old.template_generation {
        errs.push(FieldError::invalid(tg_path.clone(), &new.template_generation, "must not be decremented"));
    }
    let template_updated = !semantic_eq(&new.template, &old.template);
    if new.template_generation == old.template_generation && template_updated {
        errs.push(FieldError::invalid(tg_path, &new.template_generation, "must be incremented upon template update"));
    } else if new.template_generation > old.template_generation && !template_updated {
        errs.push(FieldError::invalid(
            tg_path,
            &new.template_generation,
            "must not be incremented without template update",
        ));
    }
    errs
}

fn validate_status(status: &DaemonSetStatus, path: &FieldPath) -> ErrorList {
    let counters: [(&str, Option<i64>); 9] = [
        ("currentNumberScheduled", Some(status.current_number_scheduled.into())),
        ("numberMisscheduled", Some(status.number_misscheduled.into())),
        ("desiredNumberScheduled", Some(status.desired_number_scheduled.into())),
        ("numberReady", Some(status.number_ready.into())),
        ("observedGeneration", status.observed_generation),
        ("updatedNumberScheduled", status.updated_number_scheduled.map(i64::from)),
        ("numberAvailable", status.number_available.map(i64::from)),
        ("numberUnavailable", status.number_unavailable.map(i64::from)),
        ("collisionCount", status.collision_count.map(i64::from)),
    ];
    counters
        .into_iter()
        .filter_map(|(name, v)| v.map(|v| (name, v)))
        .flat_map(|(name, v)| validate_non_negative(v, &path.child(name)))
        .collect()
}

fn validate_update_strategy(strategy: &DaemonSetUpdateStrategy, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    match strategy.type_.as_deref() {
        None => errs.push(FieldError::required(path.child("type"), "")),
        Some("OnDelete") => {}
        Some("RollingUpdate") => {
            let max_unavailable = strategy.rolling_update.as_ref().and_then(|r| r.max_unavailable.as_ref());
            match max_unavailable {
                None => errs.push(FieldError::required(path.child("rollingUpdate").child("maxUnavailable"), "")),
                Some(v) => errs.extend(validate_max_unavailable(v, &path.child("rollingUpdate").child("maxUnavailable"))),
            }
        }
        Some(other) => errs.push(FieldError::not_supported(path.child("type"), other, &UPDATE_STRATEGY_TYPES)),
    }
    errs
}

fn validate_max_unavailable(v: &IntOrString, path: &FieldPath) -> ErrorList {
    let value = match v {
        IntOrString::Int(i) => i64::from(*i),
        IntOrString::String(s) => match PERCENT.captures(s).and_then(|c| c[1].parse::<i64>().ok()) {
            Some(pct) if pct > 100 => {
                return vec![FieldError::invalid(path.clone(), s, "must not be greater than 100%")];
            }
            Some(pct) => pct,
            None => {
                return vec![FieldError::invalid(path.clone(), s, "must be an integer or percentage (e.g '5%')")];
            }
        },
    };
    if value < 0 {
        vec![FieldError::invalid(path.clone(), v, "must be greater than or equal to 0")]
    } else if value == 0 {
        vec![FieldError::invalid(path.clone(), v, "cannot be 0")]
    } else {
        ErrorList::new()
    }
}

fn validate_non_negative(v: i64, path: &FieldPath) -> ErrorList {
    if v < 0 {
        vec![FieldError::invalid(path.clone(), &v, "must be greater than or equal to 0")]
    } else {
        ErrorList::new()
    }
}

fn selector_is_empty(sel: &LabelSelector) -> bool {
    sel.match_labels.as_ref().map_or(true, |m| m.is_empty())
        && sel.match_expressions.as_ref().map_or(true, |e| e.is_empty())
}

fn validate_label_selector(sel: &LabelSelector, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    for (i, req) in sel.match_expressions.iter().flatten().enumerate() {
        let rpath = path.child("matchExpressions").index(i);
        let has_values = req.values.as_ref().map_or(false, |v| !v.is_empty());
        match req.operator.as_str() {
            "In" | "NotIn" if !has_values => {
                errs.push(FieldError::required(rpath.child("values"), "must be specified when `operator` is 'In' or 'NotIn'"));
            }
            "Exists" | "DoesNotExist" if has_values => {
                errs.push(FieldError::forbidden(
                    rpath.child("values"),
                    "may not be specified when `operator` is 'Exists' or 'DoesNotExist'",
                ));
            }
            op if !SELECTOR_OPERATORS.contains(&op) => {
                errs.push(FieldError::not_supported(rpath.child("operator"), op, &SELECTOR_OPERATORS));
            }
            _ => {}
        }
    }
    errs
}

/// Whether `labels` satisfy every term of `sel`.
pub fn selector_matches(sel: &LabelSelector, labels: Option<&BTreeMap<String, String>>) -> bool {
    let get = |k: &str| labels.and_then(|l| l.get(k));
    let labels_ok = sel.match_labels.iter().flatten().all(|(k, v)| get(k.as_str()) == Some(v));
    let exprs_ok = sel.match_expressions.iter().flatten().all(|req| {
        let values = req.values.as_deref().unwrap_or_default();
        match (req.operator.as_str(), get(req.key.as_str())) {
            ("In", Some(v)) => values.contains(v),
            ("In", None) => false,
            ("NotIn", Some(v)) => !values.contains(v),
            ("NotIn", None) => true,
            ("Exists", found) => found.is_some(),
            ("DoesNotExist", found) => found.is_none(),
            _ => false,
        }
    });
    labels_ok && exprs_ok
}
