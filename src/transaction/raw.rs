//! Byte-preserving envelope edits
//!
//! Co-signing replaces the entries bound to the signer and nothing else.
//! Other parties' entries, unknown fields, key order and wide integers all
//! keep the exact text they arrived with.

use super::{codec, AuthorizationEntry, TransactionEnvelope};
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::value::RawValue;
use std::ops::Range;

#[derive(Deserialize)]
struct EnvelopeView<'a> {
    #[serde(borrow)]
    tx: TxView<'a>,
}

#[derive(Deserialize)]
struct TxView<'a> {
    #[serde(borrow)]
    operations: Vec<OperationView<'a>>,
}

#[derive(Deserialize)]
struct OperationView<'a> {
    #[serde(borrow)]
    body: BodyView<'a>,
}

#[derive(Deserialize)]
struct BodyView<'a> {
    #[serde(default, borrow)]
    invoke_contract: Option<InvokeView<'a>>,
}

#[derive(Deserialize)]
struct InvokeView<'a> {
    #[serde(default, borrow)]
    auth: Vec<&'a RawValue>,
}

/// An authorization entry and where its text sits in the envelope
#[derive(Debug, Clone)]
pub struct AuthSlot {
    pub span: Range<usize>,
    pub entry: AuthorizationEntry,
}

/// Envelope JSON kept as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEnvelope {
    json: String,
}

impl RawEnvelope {
    pub fn from_base64(input: &str) -> Result<Self> {
        Ok(Self {
            json: codec::decode_text(input)?,
        })
    }

    pub fn to_base64(&self) -> String {
        codec::encode_text(&self.json)
    }

    pub fn as_str(&self) -> &str {
        &self.json
    }

    /// Typed view, for reading only
    pub fn decode(&self) -> Result<TransactionEnvelope> {
        codec::parse(&self.json)
    }

    /// Every authorization entry across contract invocations, in order
    pub fn auth_slots(&self) -> Result<Vec<AuthSlot>> {
        let view: EnvelopeView<'_> = codec::parse_borrowed(&self.json)?;
        let base = self.json.as_ptr() as usize;

        view.tx
            .operations
            .into_iter()
            .filter_map(|op| op.body.invoke_contract)
            .flat_map(|invoke| invoke.auth)
            .map(|raw| -> Result<AuthSlot> {
                let text = raw.get();
                let start = (text.as_ptr() as usize)
                    .checked_sub(base)
                    .filter(|start| start + text.len() <= self.json.len())
                    .ok_or_else(|| Error::Codec("entry outside envelope text".to_string()))?;
                Ok(AuthSlot {
                    span: start..start + text.len(),
                    entry: codec::parse(text)?,
                })
            })
            .collect()
    }

    /// Copy with each span replaced by its text; every other byte is kept
    pub fn splice(&self, mut edits: Vec<(Range<usize>, String)>) -> Result<Self> {
        edits.sort_by_key(|(span, _)| span.start);

        let mut json = String::with_capacity(self.json.len());
        let mut cursor = 0;
        for (span, text) in edits {
            let kept = self
                .json
                .get(cursor..span.start)
                .filter(|_| span.start <= span.end && span.end <= self.json.len())
                .ok_or_else(|| Error::Codec(format!("bad edit span {:?}", span)))?;
            json.push_str(kept);
            json.push_str(&text);
            cursor = span.end;
        }
        let rest = self
            .json
            .get(cursor..)
            .ok_or_else(|| Error::Codec("bad edit span".to_string()))?;
        json.push_str(rest);

        Ok(Self { json })
    }
}
