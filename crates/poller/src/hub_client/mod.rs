//! Producer side of the hub protocol: building reports and pushing them.

mod ws;

pub use ws::{run_ws_client, send_once};

use std::path::{Path, PathBuf};

use shared::{ProducerFrame, ProducerReport, SignReport, SwitchState};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("read state file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("parse state file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("printers must be a JSON value: {0}")]
    Printers(serde_json::Error),
}

/// Expand a leading `~` in a user-supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Read the current `{printers, sign}` state written by the sensor scripts.
pub async fn read_state_file(path: &Path) -> Result<ProducerReport, ReportError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ReportError::Read {
            path: path.display().to_string(),
            source,
        })?;
    serde_json::from_str(&text).map_err(|source| ReportError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Build a report from explicit switch positions and an optional printers object.
pub fn switch_report(
    door: u8,
    one_on: u8,
    two_on: u8,
    printers: Option<&str>,
) -> Result<ProducerReport, ReportError> {
    let printers = printers
        .map(serde_json::from_str)
        .transpose()
        .map_err(ReportError::Printers)?;
    Ok(ProducerReport {
        printers,
        sign: Some(SignReport {
            door,
            switch: SwitchState { one_on, two_on },
        }),
    })
}

/// Serialize a report into the keyed frame the hub expects.
pub fn encode_frame(key: &str, report: ProducerReport) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ProducerFrame {
        key: key.to_string(),
        report,
    })
}
