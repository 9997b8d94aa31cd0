//! Lookup request parsing and outcome/response shapes.

use serde::{Deserialize, Serialize};

/// Message returned whenever a search produced no usable patient row.
pub const NO_MATCH_MESSAGE: &str = "No matching patient found with given name";

/// Placeholder used by the response shaping for absent values.
pub const NOT_AVAILABLE: &str = "N/A";

/// One treatment-plan entry extracted from the patient chart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreatmentRow {
	pub date: String,
	pub description: String,
}

/// Patient record extracted from the detail view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDetail {
	pub name: String,
	pub provider: Option<String>,
	pub last_visit: Option<String>,
	#[serde(default)]
	pub treatment_rows: Vec<TreatmentRow>,
}

/// Result contract of a single lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LookupOutcome {
	NotFound { message: String },
	Found(PatientDetail),
	#[serde(rename = "error")]
	AmbiguousOrError { message: String },
}

impl LookupOutcome {
	pub fn not_found() -> Self {
		LookupOutcome::NotFound {
			message: NO_MATCH_MESSAGE.to_string(),
		}
	}

	pub fn error(message: impl Into<String>) -> Self {
		LookupOutcome::AmbiguousOrError { message: message.into() }
	}

	/// Status tag as serialized on the wire.
	pub fn status(&self) -> &'static str {
		match self {
			LookupOutcome::NotFound { .. } => "not_found",
			LookupOutcome::Found(_) => "found",
			LookupOutcome::AmbiguousOrError { .. } => "error",
		}
	}
}

/// Lookup arguments as they appear in a request body.
///
/// Every field is optional at this layer; [`LookupArgs::validate`] decides
/// whether the request is usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupArgs {
	#[serde(default, alias = "suaveBranch", alias = "office")]
	pub branch: Option<String>,
	#[serde(default)]
	pub dob: Option<String>,
	#[serde(default)]
	pub first_name: Option<String>,
	#[serde(default)]
	pub last_name: Option<String>,
}

/// Fully specified lookup query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
	pub branch: String,
	pub dob: String,
	pub first_name: String,
	pub last_name: String,
}

impl LookupArgs {
	/// Converts to a [`LookupQuery`], treating blank strings as missing.
	pub fn validate(self) -> Result<LookupQuery, MissingFields> {
		fn present(value: Option<String>) -> Option<String> {
			value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
		}

		match (present(self.branch), present(self.dob), present(self.first_name), present(self.last_name)) {
			(Some(branch), Some(dob), Some(first_name), Some(last_name)) => Ok(LookupQuery {
				branch,
				dob,
				first_name,
				last_name,
			}),
			_ => Err(MissingFields::default()),
		}
	}
}

/// Tool-call arguments arrive either as an object or as an encoded JSON string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ToolArguments {
	Object(LookupArgs),
	Encoded(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolFunction {
	#[serde(default)]
	pub name: Option<String>,
	pub arguments: ToolArguments,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
	#[serde(default)]
	pub id: Option<String>,
	pub function: ToolFunction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallMessage {
	pub tool_calls: Vec<ToolCall>,
}

/// Body of `POST /lookup`.
///
/// Either the direct argument object, or a voice-assistant tool-call envelope
/// of the form `{"message": {"toolCalls": [{"function": {"arguments": {...}}}]}}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LookupRequest {
	ToolCall { message: ToolCallMessage },
	Direct(LookupArgs),
}

impl LookupRequest {
	/// Extracts the arguments of the first tool call, or the direct body.
	pub fn into_args(self) -> LookupArgs {
		match self {
			LookupRequest::Direct(args) => args,
			LookupRequest::ToolCall { message } => match message.tool_calls.into_iter().next() {
				Some(call) => match call.function.arguments {
					ToolArguments::Object(args) => args,
					ToolArguments::Encoded(raw) => serde_json::from_str(&raw).unwrap_or_default(),
				},
				None => LookupArgs::default(),
			},
		}
	}
}

/// Reply for a lookup request that lacks required fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingFields {
	pub error: String,
	pub message: String,
}

impl Default for MissingFields {
	fn default() -> Self {
		Self {
			error: "Missing required fields".to_string(),
			message: "Please provide branch, firstName, lastName, and dob".to_string(),
		}
	}
}

/// `treatmentrows` is either the list or the literal `"N/A"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TreatmentRowsField {
	Rows(Vec<TreatmentRow>),
	NotAvailable(&'static str),
}

/// Flat response shape consumed by the voice assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupResponse {
	pub status: &'static str,
	#[serde(rename = "PatientName")]
	pub patient_name: String,
	#[serde(rename = "DoctorName")]
	pub doctor_name: String,
	#[serde(rename = "PatientLastVisit")]
	pub last_visit: String,
	#[serde(rename = "treatmentrows")]
	pub treatment_rows: TreatmentRowsField,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

impl From<&LookupOutcome> for LookupResponse {
	fn from(outcome: &LookupOutcome) -> Self {
		match outcome {
			LookupOutcome::Found(detail) => Self {
				status: outcome.status(),
				patient_name: detail.name.clone(),
				doctor_name: detail.provider.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
				last_visit: detail.last_visit.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
				treatment_rows: if detail.treatment_rows.is_empty() {
					TreatmentRowsField::NotAvailable(NOT_AVAILABLE)
				} else {
					TreatmentRowsField::Rows(detail.treatment_rows.clone())
				},
				message: None,
			},
			LookupOutcome::NotFound { message } | LookupOutcome::AmbiguousOrError { message } => Self {
				status: outcome.status(),
				patient_name: "No patient record found".to_string(),
				doctor_name: NOT_AVAILABLE.to_string(),
				last_visit: NOT_AVAILABLE.to_string(),
				treatment_rows: TreatmentRowsField::NotAvailable(NOT_AVAILABLE),
				message: Some(message.clone()),
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn not_found_serializes_with_status_tag() {
		let json = serde_json::to_value(LookupOutcome::not_found()).unwrap();
		assert_eq!(
			json,
			json!({
				"status": "not_found",
				"message": "No matching patient found with given name"
			})
		);
	}

	#[test]
	fn found_serializes_detail_inline() {
		let outcome = LookupOutcome::Found(PatientDetail {
			name: "John Smith".into(),
			provider: Some("Jane Roe DDS".into()),
			last_visit: None,
			treatment_rows: vec![],
		});
		let json = serde_json::to_value(&outcome).unwrap();
		assert_eq!(json["status"], "found");
		assert_eq!(json["name"], "John Smith");
		assert_eq!(json["lastVisit"], serde_json::Value::Null);
		assert_eq!(json["treatmentRows"], json!([]));
	}

	#[test]
	fn parses_direct_body_with_legacy_branch_field() {
		let req: LookupRequest = serde_json::from_value(json!({
			"suaveBranch": "stockton",
			"dob": "04/19/1970",
			"firstName": "John",
			"lastName": "Smith"
		}))
		.unwrap();
		let query = req.into_args().validate().unwrap();
		assert_eq!(query.branch, "stockton");
		assert_eq!(query.last_name, "Smith");
	}

	#[test]
	fn parses_tool_call_envelope() {
		let req: LookupRequest = serde_json::from_value(json!({
			"message": {
				"type": "tool-calls",
				"toolCalls": [{
					"id": "call_1",
					"type": "function",
					"function": {
						"name": "lookup",
						"arguments": { "branch": "merced", "dob": "11/01/1977", "firstName": "Lisa", "lastName": "Chaney" }
					}
				}]
			}
		}))
		.unwrap();
		let query = req.into_args().validate().unwrap();
		assert_eq!(query.branch, "merced");
		assert_eq!(query.first_name, "Lisa");
	}

	#[test]
	fn parses_tool_call_with_encoded_arguments() {
		let req: LookupRequest = serde_json::from_value(json!({
			"message": {
				"toolCalls": [{
					"function": { "arguments": "{\"branch\":\"modesto\",\"dob\":\"01/02/1990\",\"firstName\":\"A\",\"lastName\":\"B\"}" }
				}]
			}
		}))
		.unwrap();
		assert_eq!(req.into_args().branch.as_deref(), Some("modesto"));
	}

	#[test]
	fn blank_fields_are_missing() {
		let args = LookupArgs {
			branch: Some("stockton".into()),
			dob: Some("  ".into()),
			first_name: Some("A".into()),
			last_name: Some("B".into()),
		};
		let err = args.validate().unwrap_err();
		assert_eq!(err.error, "Missing required fields");
	}

	#[test]
	fn empty_tool_calls_yield_missing_fields() {
		let req: LookupRequest = serde_json::from_value(json!({ "message": { "toolCalls": [] } })).unwrap();
		assert!(req.into_args().validate().is_err());
	}

	#[test]
	fn response_shaping_for_found_and_not_found() {
		let found = LookupOutcome::Found(PatientDetail {
			name: "John Smith".into(),
			provider: None,
			last_visit: Some("03/04/2024".into()),
			treatment_rows: vec![TreatmentRow {
				date: "03/01/2024".into(),
				description: "Crown".into(),
			}],
		});
		let json = serde_json::to_value(LookupResponse::from(&found)).unwrap();
		assert_eq!(json["PatientName"], "John Smith");
		assert_eq!(json["DoctorName"], "N/A");
		assert_eq!(json["treatmentrows"][0]["description"], "Crown");
		assert!(json.get("message").is_none());

		let json = serde_json::to_value(LookupResponse::from(&LookupOutcome::not_found())).unwrap();
		assert_eq!(json["status"], "not_found");
		assert_eq!(json["PatientName"], "No patient record found");
		assert_eq!(json["treatmentrows"], "N/A");
		assert_eq!(json["message"], NO_MATCH_MESSAGE);
	}
}
