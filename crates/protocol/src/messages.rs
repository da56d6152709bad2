//! Request schemas, one per operation code.
//!
//! Operations without arguments send `()` (encoded as `null`). Replies are
//! plain JSON values (`i32`, `bool`, `String`, [`ObjectSlot`]) unless noted.

use serde::{Deserialize, Serialize};

use crate::bundle::Bundle;
use crate::types::ObjectSlot;

/// `service::ATTACH_APPLICATION`. The application stub travels in the object table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachApplication {
	pub application: ObjectSlot,
	pub package_name: String,
}

/// `service::CHECK_PERMISSION`, replies with a permission code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPermission {
	pub permission: String,
}

/// `service::NEW_PROCESS`, replies with the slot of the process handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProcess {
	pub cmd: Vec<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub env: Option<Vec<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub dir: Option<String>,
}

/// `service::REQUEST_PERMISSION`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPermission {
	pub request_code: i32,
}

/// `service::ADD_USER_SERVICE`, replies with a server status code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUserService {
	pub connection: ObjectSlot,
	pub options: Bundle,
}

/// `service::REMOVE_USER_SERVICE`, replies with a server status code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveUserService {
	pub options: Bundle,
}

/// `service::ATTACH_USER_SERVICE`, sent from inside a user service process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachUserService {
	pub binder: ObjectSlot,
	pub options: Bundle,
}

/// `service::DISPATCH_PERMISSION_CONFIRMATION_RESULT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPermissionConfirmationResult {
	pub request_uid: i32,
	pub request_pid: i32,
	pub request_code: i32,
	pub data: Bundle,
}

/// `service::GET_FLAGS_FOR_UID`, replies with the masked flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFlagsForUid {
	pub uid: i32,
	pub mask: i32,
}

/// `service::UPDATE_FLAGS_FOR_UID`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFlagsForUid {
	pub uid: i32,
	pub mask: i32,
	pub value: i32,
}

/// `application::BIND_APPLICATION`, the asynchronous attach reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindApplication {
	pub data: Bundle,
}

/// `application::DISPATCH_REQUEST_PERMISSION_RESULT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequestPermissionResult {
	pub request_code: i32,
	pub data: Bundle,
}

/// `application::SHOW_PERMISSION_CONFIRMATION`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowPermissionConfirmation {
	pub request_uid: i32,
	pub request_pid: i32,
	pub request_package_name: String,
	pub request_code: i32,
}

/// `connection::CONNECTED`. The sub-service handle travels in the object table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConnected {
	pub service: ObjectSlot,
}

/// `process::WAIT_FOR` with an optional bound in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitFor {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timeout_ms: Option<u64>,
}
