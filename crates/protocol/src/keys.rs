//! Bundle keys understood by both peers.

pub const ATTACH_REPLY_SERVER_UID: &str = "tether:attach-reply-server-uid";
pub const ATTACH_REPLY_SERVER_VERSION: &str = "tether:attach-reply-server-version";
pub const ATTACH_REPLY_SERVER_PATCH_VERSION: &str = "tether:attach-reply-server-patch-version";
pub const ATTACH_REPLY_SERVER_SECONTEXT: &str = "tether:attach-reply-server-secontext";
pub const ATTACH_REPLY_PERMISSION_GRANTED: &str = "tether:attach-reply-permission-granted";
pub const ATTACH_REPLY_SHOULD_SHOW_REQUEST_PERMISSION_RATIONALE: &str = "tether:attach-reply-should-show-request-permission-rationale";

pub const REQUEST_PERMISSION_REPLY_ALLOWED: &str = "tether:request-permission-reply-allowed";

pub const USER_SERVICE_ARG_COMPONENT: &str = "tether:user-service-arg-component";
pub const USER_SERVICE_ARG_DEBUGGABLE: &str = "tether:user-service-arg-debuggable";
pub const USER_SERVICE_ARG_VERSION_CODE: &str = "tether:user-service-arg-version-code";
pub const USER_SERVICE_ARG_PROCESS_NAME: &str = "tether:user-service-arg-process-name";
pub const USER_SERVICE_ARG_TAG: &str = "tether:user-service-arg-tag";
