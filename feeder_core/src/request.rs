//! Decoding trigger payloads into `FeedRequest`s.
//!
//! Two transport shapes are accepted: a JSON body
//! `{"rotations": <int>, "asOf": <int>}` where `asOf` may be omitted, and
//! form fields `rotations` / `asOf` where both are required.

use serde::Deserialize;

use crate::error::PayloadError;

/// A decoded trigger, not yet checked against the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedRequest {
    /// Sender-supplied idempotence key, epoch seconds.
    pub as_of: u64,
    /// Adjusted wall-clock time recorded with the feed.
    pub adjusted_time_sec: u64,
    pub rotations: u32,
}

#[derive(Debug, Deserialize)]
struct JsonPayload {
    rotations: Option<i64>,
    #[serde(rename = "asOf")]
    as_of: Option<i64>,
}

impl FeedRequest {
    pub fn new(as_of: u64, adjusted_time_sec: u64, rotations: u32) -> Self {
        Self {
            as_of,
            adjusted_time_sec,
            rotations,
        }
    }

    /// Decode a JSON trigger. A missing `asOf` defaults to `now_adjusted_sec`.
    pub fn from_json(payload: &str, now_adjusted_sec: u64) -> Result<Self, PayloadError> {
        let body: JsonPayload =
            serde_json::from_str(payload).map_err(|e| PayloadError::Json(e.to_string()))?;
        let rotations = body.rotations.ok_or(PayloadError::Missing("rotations"))?;
        let rotations = positive_u32("rotations", rotations)?;
        let as_of = match body.as_of {
            Some(v) => positive_u64("asOf", v)?,
            None => now_adjusted_sec,
        };
        Ok(Self::new(as_of, now_adjusted_sec, rotations))
    }

    /// Decode form fields. Unknown fields are ignored; the last value of a
    /// repeated field wins.
    pub fn from_form<'a, I>(fields: I, now_adjusted_sec: u64) -> Result<Self, PayloadError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut rotations = None;
        let mut as_of = None;
        for (name, value) in fields {
            match name {
                "rotations" => rotations = Some(value),
                "asOf" => as_of = Some(value),
                _ => {}
            }
        }
        let rotations = rotations.ok_or(PayloadError::Missing("rotations"))?;
        let as_of = as_of.ok_or(PayloadError::Missing("asOf"))?;
        let rotations = positive_u32("rotations", parse_int("rotations", rotations)?)?;
        let as_of = positive_u64("asOf", parse_int("asOf", as_of)?)?;
        Ok(Self::new(as_of, now_adjusted_sec, rotations))
    }
}

fn parse_int(field: &'static str, raw: &str) -> Result<i64, PayloadError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| PayloadError::NotPositive {
            field,
            value: raw.to_string(),
        })
}

fn positive_u64(field: &'static str, v: i64) -> Result<u64, PayloadError> {
    if v <= 0 {
        return Err(PayloadError::NotPositive {
            field,
            value: v.to_string(),
        });
    }
    u64::try_from(v).map_err(|_| PayloadError::OutOfRange {
        field,
        value: v.to_string(),
    })
}

fn positive_u32(field: &'static str, v: i64) -> Result<u32, PayloadError> {
    let v = positive_u64(field, v)?;
    u32::try_from(v).map_err(|_| PayloadError::OutOfRange {
        field,
        value: v.to_string(),
    })
}
