//! Encoders for rendered objects.

use std::{cmp::Ordering, io::Write};

use kube::api::DynamicObject;
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
	#[error("converting object to JSON")]
	ToJson(#[source] serde_json::Error),

	#[error("serializing YAML")]
	Yaml(#[source] serde_yaml_with_quirks::Error),

	#[error("serializing JSON")]
	Json(#[source] serde_json::Error),

	#[error("writing output")]
	Io(#[from] std::io::Error),
}

/// Serializes one object as a single document.
///
/// Document separators are the caller's business.
pub trait Encoder {
	fn write(&self, object: &DynamicObject, out: &mut dyn Write) -> Result<(), EncodeError>;
}

/// Output format selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
	#[default]
	Yaml,
	Json,
}

impl OutputFormat {
	pub fn encoder(self) -> Box<dyn Encoder> {
		match self {
			OutputFormat::Yaml => Box::new(YamlEncoder),
			OutputFormat::Json => Box::new(JsonEncoder),
		}
	}
}

/// YAML with mapping keys sorted the way kubectl prints them.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlEncoder;

impl Encoder for YamlEncoder {
	fn write(&self, object: &DynamicObject, out: &mut dyn Write) -> Result<(), EncodeError> {
		let value = serde_json::to_value(object).map_err(EncodeError::ToJson)?;
		let rendered = serde_yaml_with_quirks::to_string(&sort_keys(value)).map_err(EncodeError::Yaml)?;
		// The serializer opens every document with its own marker
		let body = rendered.strip_prefix("---\n").unwrap_or(&rendered);
		out.write_all(body.as_bytes())?;
		if !body.ends_with('\n') {
			out.write_all(b"\n")?;
		}
		Ok(())
	}
}

/// Pretty-printed JSON, keys in insertion order.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
	fn write(&self, object: &DynamicObject, out: &mut dyn Write) -> Result<(), EncodeError> {
		serde_json::to_writer_pretty(&mut *out, object).map_err(EncodeError::Json)?;
		out.write_all(b"\n")?;
		Ok(())
	}
}

/// Recursively sort object keys in natural order.
pub fn sort_keys(value: JsonValue) -> JsonValue {
	match value {
		JsonValue::Object(map) => {
			let mut entries: Vec<_> = map.into_iter().collect();
			entries.sort_by(|(a, _), (b, _)| natural_cmp(a, b));
			JsonValue::Object(entries.into_iter().map(|(k, v)| (k, sort_keys(v))).collect())
		}
		JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(sort_keys).collect()),
		other => other,
	}
}

/// Compare keys treating embedded digit runs as numbers, so `item2` sorts
/// before `item10`.
fn natural_cmp(a: &str, b: &str) -> Ordering {
	let mut a = a.chars().peekable();
	let mut b = b.chars().peekable();
	loop {
		match (a.peek().copied(), b.peek().copied()) {
			(None, None) => return Ordering::Equal,
			(None, Some(_)) => return Ordering::Less,
			(Some(_), None) => return Ordering::Greater,
			(Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
				let left = take_digits(&mut a);
				let right = take_digits(&mut b);
				let ord = left
					.trim_start_matches('0')
					.len()
					.cmp(&right.trim_start_matches('0').len())
					.then_with(|| left.trim_start_matches('0').cmp(right.trim_start_matches('0')))
					.then_with(|| left.len().cmp(&right.len()));
				if ord != Ordering::Equal {
					return ord;
				}
			}
			(Some(x), Some(y)) => {
				if x != y {
					return x.cmp(&y);
				}
				a.next();
				b.next();
			}
		}
	}
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
	let mut run = String::new();
	while let Some(c) = chars.next_if(char::is_ascii_digit) {
		run.push(c);
	}
	run
}
