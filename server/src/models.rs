use serde::Serialize;
use vectis_core::{DataPoint, MatrixProfileEntry, SeriesExport, SeriesStats, SimilarityMatch};

use crate::errors::ProtocolError;

/// One response line: `{"status": <variant>, "data": <payload>}`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", content = "data")]
pub(crate) enum Response {
    Success(SuccessBody),
    Error(ProtocolError),
    Data(Vec<DataPoint>),
    Stats(SeriesStats),
    Similar(Vec<SimilarityMatch>),
    Anomalies(Vec<MatrixProfileEntry>),
    Motifs(Vec<MatrixProfileEntry>),
    SeriesList(Vec<String>),
    SeriesExport(SeriesExport),
    Pong,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct SuccessBody {
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) count: Option<usize>,
}

impl Response {
    pub(crate) fn success(message: impl Into<String>) -> Self {
        Self::Success(SuccessBody {
            message: message.into(),
            ..SuccessBody::default()
        })
    }

    pub(crate) fn inserted(timestamp: u64) -> Self {
        Self::Success(SuccessBody {
            message: "inserted".to_string(),
            timestamp: Some(timestamp),
            count: Some(1),
        })
    }

    pub(crate) fn counted(message: impl Into<String>, count: usize) -> Self {
        Self::Success(SuccessBody {
            message: message.into(),
            timestamp: None,
            count: Some(count),
        })
    }

    /// Serializes as one newline-terminated line.
    pub(crate) fn to_line(&self) -> Vec<u8> {
        let mut line = serde_json::to_vec(self).unwrap_or_else(|error| {
            let fallback = Response::Error(ProtocolError::internal(format!(
                "failed to encode response: {error}"
            )));
            serde_json::to_vec(&fallback).unwrap_or_else(|_| {
                br#"{"status":"Error","data":{"code":"Internal","message":"encoding failed"}}"#
                    .to_vec()
            })
        });
        line.push(b'\n');
        line
    }
}

impl From<ProtocolError> for Response {
    fn from(error: ProtocolError) -> Self {
        Self::Error(error)
    }
}
