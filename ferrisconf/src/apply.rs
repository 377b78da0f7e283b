//! Idempotent reconcile of one feature against a device.
//!
//! [`apply`] reads current state, works out what differs from the request,
//! and only then builds and runs ops. The returned [`ModuleResult`] carries
//! the before/after state for reporting.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::device::{Device, StagedOp};
use crate::error::{ParamError, Result};
use crate::feature::{Feature, dispatch};

/// Whether the object should exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    #[default]
    Present,
    Absent,
}

/// Outcome of one [`apply`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleResult {
    pub changed: bool,
    /// Requested parameters that were set.
    pub proposed: Map<String, Value>,
    /// State before the change; empty when the object did not exist.
    pub existing: Map<String, Value>,
    /// Proposed parameters whose value differs from `existing`.
    pub delta: Map<String, Value>,
    /// State after the change. Equal to `existing` in check mode.
    pub end_state: Map<String, Value>,
    /// Ops that were run, or would have been in check mode.
    pub ops: Vec<StagedOp>,
}

fn to_map<T: Serialize>(value: Option<&T>) -> Result<Map<String, Value>> {
    let Some(value) = value else {
        return Ok(Map::new());
    };
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .collect()),
        Ok(_) => Ok(Map::new()),
        Err(e) => Err(ParamError::invalid("config", e.to_string()).into()),
    }
}

/// Proposed entries whose value is missing from or different in `existing`.
pub fn delta(proposed: &Map<String, Value>, existing: &Map<String, Value>) -> Map<String, Value> {
    proposed
        .iter()
        .filter(|(k, v)| existing.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Bring `feature` to `state`, with `desired` as the requested attributes
/// when present.
///
/// Nothing is sent when the device already matches. In check mode the ops
/// are computed and returned but never run.
pub async fn apply<F: Feature>(
    device: &mut Device,
    feature: &F,
    state: State,
    desired: &F::Config,
    check_mode: bool,
) -> Result<ModuleResult> {
    let desired = feature.normalize(desired.clone());
    if state == State::Present {
        feature.validate(&desired)?;
    }

    let current = feature.get_config(device).await?;
    let proposed = to_map(Some(&desired))?;
    let existing = to_map(current.as_ref())?;
    let delta = delta(&proposed, &existing);

    let ops = match state {
        State::Present if current.is_none() || !delta.is_empty() => {
            feature.build_ops(&desired, current.as_ref())?
        }
        State::Absent if current.is_some() => feature.remove_ops(current.as_ref())?,
        _ => Vec::new(),
    };
    let ops: Vec<StagedOp> = ops.into_iter().filter(|op| !op.is_empty()).collect();
    let changed = !ops.is_empty();

    let end_state = if changed && !check_mode {
        info!("applying {} ops ({:?})", ops.len(), state);
        dispatch(device, ops.clone(), false).await?;
        to_map(feature.get_config(device).await?.as_ref())?
    } else {
        debug!("no ops run (changed: {}, check mode: {})", changed, check_mode);
        existing.clone()
    };

    Ok(ModuleResult {
        changed,
        proposed,
        existing,
        delta,
        end_state,
        ops,
    })
}
