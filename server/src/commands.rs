//! Request decoding. A line starting with `{` is a JSON envelope
//! `{"type": ..., "data": {...}}`; anything else is the text grammar.

use std::path::PathBuf;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use vectis_core::{Labels, PointInput, Timestamp};

use crate::errors::ProtocolError;

const DEFAULT_SIMILAR_LIMIT: usize = 10;

pub(crate) const HELP_TEXT: &str = "\
CREATE name dim
INSERT name v1,v2,...[ k=v,...]
INSERT_AT name ts v1,v2,...[ k=v,...]
QUERY name [hoursBack]
QUERY_RANGE name startNs endNs
SIMILAR name v1,...,vN limit [threshold]
ANOMALY name window k
MOTIF name window k
STATS name
LIST
EXPORT name
SAVE [path]
LOAD [path]
FLUSH
PING
HELP";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Create {
        name: String,
        dimension: usize,
    },
    Insert {
        series: String,
        point: PointInput,
    },
    InsertBatch {
        series: String,
        points: Vec<PointInput>,
    },
    Query {
        series: String,
        hours_back: Option<u64>,
    },
    QueryRange {
        series: String,
        start: Timestamp,
        end: Timestamp,
    },
    Similar {
        series: String,
        vector: Vec<f32>,
        limit: usize,
        threshold: f32,
    },
    Anomaly {
        series: String,
        window: usize,
        k: usize,
    },
    Motif {
        series: String,
        window: usize,
        k: usize,
    },
    Stats {
        series: String,
    },
    List,
    Export {
        series: String,
    },
    /// `None` targets the configured data file.
    Save {
        path: Option<PathBuf>,
    },
    Load {
        path: Option<PathBuf>,
    },
    Flush,
    Ping,
    Help,
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Insert { .. } => "insert",
            Self::InsertBatch { .. } => "insert_batch",
            Self::Query { .. } => "query",
            Self::QueryRange { .. } => "query_range",
            Self::Similar { .. } => "similar",
            Self::Anomaly { .. } => "anomaly",
            Self::Motif { .. } => "motif",
            Self::Stats { .. } => "stats",
            Self::List => "list",
            Self::Export { .. } => "export",
            Self::Save { .. } => "save",
            Self::Load { .. } => "load",
            Self::Flush => "flush",
            Self::Ping => "ping",
            Self::Help => "help",
        }
    }

    pub(crate) fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Create { .. } | Self::Insert { .. } | Self::InsertBatch { .. }
        )
    }
}

pub(crate) fn parse_line(line: &str) -> Result<Command, ProtocolError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::invalid_argument("empty command"));
    }
    if trimmed.starts_with('{') {
        parse_envelope(trimmed)
    } else {
        parse_text(trimmed)
    }
}

fn parse_text(line: &str) -> Result<Command, ProtocolError> {
    let mut tokens = line.split_whitespace();
    let verb = tokens.next().unwrap_or_default();
    let args: Vec<&str> = tokens.collect();

    let command = match verb.to_ascii_uppercase().as_str() {
        "CREATE" => {
            expect_args(&args, 2, 2, "CREATE name dim")?;
            Command::Create {
                name: args[0].to_string(),
                dimension: parse_number(args[1], "dimension")?,
            }
        }
        "INSERT" => {
            expect_args(&args, 2, 3, "INSERT name v1,v2,...[ k=v,...]")?;
            let point = PointInput::new(parse_values(args[1])?)
                .with_labels(parse_optional_labels(args.get(2))?);
            Command::Insert {
                series: args[0].to_string(),
                point,
            }
        }
        "INSERT_AT" => {
            expect_args(&args, 3, 4, "INSERT_AT name ts v1,v2,...[ k=v,...]")?;
            let point = PointInput::at(parse_number(args[1], "timestamp")?, parse_values(args[2])?)
                .with_labels(parse_optional_labels(args.get(3))?);
            Command::Insert {
                series: args[0].to_string(),
                point,
            }
        }
        "QUERY" => {
            expect_args(&args, 1, 2, "QUERY name [hoursBack]")?;
            Command::Query {
                series: args[0].to_string(),
                hours_back: args
                    .get(1)
                    .map(|raw| parse_number(raw, "hoursBack"))
                    .transpose()?,
            }
        }
        "QUERY_RANGE" => {
            expect_args(&args, 3, 3, "QUERY_RANGE name startNs endNs")?;
            Command::QueryRange {
                series: args[0].to_string(),
                start: parse_number(args[1], "startNs")?,
                end: parse_number(args[2], "endNs")?,
            }
        }
        "SIMILAR" => {
            expect_args(&args, 3, 4, "SIMILAR name v1,...,vN limit [threshold]")?;
            Command::Similar {
                series: args[0].to_string(),
                vector: parse_values(args[1])?,
                limit: parse_number(args[2], "limit")?,
                threshold: args
                    .get(3)
                    .map(|raw| parse_number(raw, "threshold"))
                    .transpose()?
                    .unwrap_or(0.0),
            }
        }
        "ANOMALY" | "MOTIF" => {
            expect_args(&args, 3, 3, "ANOMALY|MOTIF name window k")?;
            let series = args[0].to_string();
            let window = parse_number(args[1], "window")?;
            let k = parse_number(args[2], "k")?;
            if verb.eq_ignore_ascii_case("ANOMALY") {
                Command::Anomaly { series, window, k }
            } else {
                Command::Motif { series, window, k }
            }
        }
        "STATS" => {
            expect_args(&args, 1, 1, "STATS name")?;
            Command::Stats {
                series: args[0].to_string(),
            }
        }
        "EXPORT" => {
            expect_args(&args, 1, 1, "EXPORT name")?;
            Command::Export {
                series: args[0].to_string(),
            }
        }
        // The path is the rest of the line so it may contain spaces.
        "SAVE" => Command::Save {
            path: rest_as_path(line, verb),
        },
        "LOAD" => Command::Load {
            path: rest_as_path(line, verb),
        },
        "LIST" | "FLUSH" | "PING" | "HELP" => {
            expect_args(&args, 0, 0, verb)?;
            match verb.to_ascii_uppercase().as_str() {
                "LIST" => Command::List,
                "FLUSH" => Command::Flush,
                "PING" => Command::Ping,
                _ => Command::Help,
            }
        }
        _ => return Err(ProtocolError::unknown_command(verb)),
    };

    Ok(command)
}

fn expect_args(args: &[&str], min: usize, max: usize, usage: &str) -> Result<(), ProtocolError> {
    if args.len() < min || args.len() > max {
        return Err(ProtocolError::invalid_argument(format!("usage: {usage}")));
    }
    Ok(())
}

fn parse_number<T: FromStr>(raw: &str, what: &str) -> Result<T, ProtocolError> {
    raw.parse()
        .map_err(|_| ProtocolError::invalid_argument(format!("invalid {what} '{raw}'")))
}

fn parse_values(raw: &str) -> Result<Vec<f32>, ProtocolError> {
    raw.split(',')
        .enumerate()
        .map(|(index, value)| {
            value.trim().parse::<f32>().map_err(|_| {
                ProtocolError::invalid_argument(format!("invalid value '{value}' at index {index}"))
            })
        })
        .collect()
}

fn parse_optional_labels(raw: Option<&&str>) -> Result<Labels, ProtocolError> {
    let Some(raw) = raw else {
        return Ok(Labels::new());
    };

    let mut labels = Labels::new();
    for pair in raw.split(',').filter(|pair| !pair.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(ProtocolError::invalid_argument(format!(
                "invalid label '{pair}', expected key=value"
            )));
        };
        labels.insert(key.to_string(), value.to_string());
    }
    Ok(labels)
}

fn rest_as_path(line: &str, verb: &str) -> Option<PathBuf> {
    let rest = line[verb.len()..].trim();
    (!rest.is_empty()).then(|| PathBuf::from(rest))
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct CreatePayload {
    name: String,
    dimension: usize,
}

#[derive(Debug, Deserialize)]
struct InsertPayload {
    series: String,
    values: Vec<f32>,
    #[serde(default)]
    labels: Labels,
    #[serde(default)]
    timestamp: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
struct BatchPayload {
    series: String,
    points: Vec<BatchPoint>,
}

#[derive(Debug, Deserialize)]
struct BatchPoint {
    #[serde(default)]
    timestamp: Option<Timestamp>,
    values: Vec<f32>,
    #[serde(default)]
    labels: Labels,
}

#[derive(Debug, Deserialize)]
struct QueryPayload {
    series: String,
    #[serde(default, alias = "hoursBack")]
    hours_back: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RangePayload {
    series: String,
    start: Timestamp,
    end: Timestamp,
}

#[derive(Debug, Deserialize)]
struct SimilarPayload {
    series: String,
    vector: Vec<f32>,
    #[serde(default = "default_similar_limit")]
    limit: usize,
    #[serde(default)]
    threshold: f32,
}

fn default_similar_limit() -> usize {
    DEFAULT_SIMILAR_LIMIT
}

#[derive(Debug, Deserialize)]
struct ProfilePayload {
    series: String,
    window: usize,
    k: usize,
}

#[derive(Debug, Deserialize)]
struct SeriesPayload {
    series: String,
}

#[derive(Debug, Default, Deserialize)]
struct PathPayload {
    #[serde(default)]
    path: Option<PathBuf>,
}

fn parse_envelope(line: &str) -> Result<Command, ProtocolError> {
    let envelope: Envelope = serde_json::from_str(line)
        .map_err(|error| ProtocolError::invalid_argument(format!("invalid envelope: {error}")))?;
    let kind = envelope.kind.as_str();
    let data = envelope.data;

    let command = match kind {
        "CreateSeries" => {
            let payload: CreatePayload = payload(kind, data)?;
            Command::Create {
                name: payload.name,
                dimension: payload.dimension,
            }
        }
        "Insert" | "InsertWithLabels" | "InsertWithTimestamp" => {
            let payload: InsertPayload = payload(kind, data)?;
            if kind == "InsertWithTimestamp" && payload.timestamp.is_none() {
                return Err(ProtocolError::invalid_argument(
                    "InsertWithTimestamp requires a timestamp",
                ));
            }
            Command::Insert {
                series: payload.series,
                point: PointInput {
                    timestamp: payload.timestamp,
                    values: payload.values,
                    labels: payload.labels,
                },
            }
        }
        "BatchInsert" => {
            let payload: BatchPayload = payload(kind, data)?;
            Command::InsertBatch {
                series: payload.series,
                points: payload
                    .points
                    .into_iter()
                    .map(|point| PointInput {
                        timestamp: point.timestamp,
                        values: point.values,
                        labels: point.labels,
                    })
                    .collect(),
            }
        }
        "Query" => {
            let payload: QueryPayload = payload(kind, data)?;
            Command::Query {
                series: payload.series,
                hours_back: payload.hours_back,
            }
        }
        "QueryRange" => {
            let payload: RangePayload = payload(kind, data)?;
            Command::QueryRange {
                series: payload.series,
                start: payload.start,
                end: payload.end,
            }
        }
        "FindSimilar" => {
            let payload: SimilarPayload = payload(kind, data)?;
            Command::Similar {
                series: payload.series,
                vector: payload.vector,
                limit: payload.limit,
                threshold: payload.threshold,
            }
        }
        "Anomaly" | "Motif" => {
            let payload: ProfilePayload = payload(kind, data)?;
            if kind == "Anomaly" {
                Command::Anomaly {
                    series: payload.series,
                    window: payload.window,
                    k: payload.k,
                }
            } else {
                Command::Motif {
                    series: payload.series,
                    window: payload.window,
                    k: payload.k,
                }
            }
        }
        "GetStats" => Command::Stats {
            series: payload::<SeriesPayload>(kind, data)?.series,
        },
        "ExportSeries" => Command::Export {
            series: payload::<SeriesPayload>(kind, data)?.series,
        },
        "ListSeries" => Command::List,
        "Save" => Command::Save {
            path: optional_payload::<PathPayload>(kind, data)?.path,
        },
        "Load" => Command::Load {
            path: optional_payload::<PathPayload>(kind, data)?.path,
        },
        "Flush" => Command::Flush,
        "Ping" => Command::Ping,
        "Help" => Command::Help,
        other => return Err(ProtocolError::unknown_command(other)),
    };

    Ok(command)
}

fn payload<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data)
        .map_err(|error| ProtocolError::invalid_argument(format!("invalid {kind} payload: {error}")))
}

fn optional_payload<T: DeserializeOwned + Default>(
    kind: &str,
    data: Value,
) -> Result<T, ProtocolError> {
    if data.is_null() {
        return Ok(T::default());
    }
    payload(kind, data)
}

#[cfg(test)]
mod tests;
