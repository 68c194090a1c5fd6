#[derive(Debug, serde::Serialize)]
#[serde(transparent)]
pub(crate) struct ErrorCode {
    code: &'static str,
}

impl ErrorCode {
    pub(crate) const COMMAND_TIMEOUT: ErrorCode = ErrorCode {
        code: "command-timeout",
    };
    pub(crate) const COMMAND_ERROR: ErrorCode = ErrorCode {
        code: "command-error",
    };
    pub(crate) const COMMAND_FAILURE: ErrorCode = ErrorCode {
        code: "command-failure",
    };
    pub(crate) const COMMAND_NOT_FOUND: ErrorCode = ErrorCode {
        code: "command-not-found",
    };
    pub(crate) const COMMAND_PERMISSION_DENIED: ErrorCode = ErrorCode {
        code: "command-permission-denied",
    };
    pub(crate) const PROBE_OUTPUT: ErrorCode = ErrorCode {
        code: "probe-output",
    };
    pub(crate) const NO_VIDEO_STREAM: ErrorCode = ErrorCode {
        code: "no-video-stream",
    };
    pub(crate) const INVALID_DIMENSIONS: ErrorCode = ErrorCode {
        code: "invalid-dimensions",
    };
    pub(crate) const INVALID_FILE_PATH: ErrorCode = ErrorCode {
        code: "invalid-file-path",
    };
    pub(crate) const OBJECT_REQUEST_ERROR: ErrorCode = ErrorCode {
        code: "object-request-error",
    };
    pub(crate) const OBJECT_IO_ERROR: ErrorCode = ErrorCode {
        code: "object-io-error",
    };
    pub(crate) const PUBLIC_URL_ERROR: ErrorCode = ErrorCode {
        code: "public-url-error",
    };
    pub(crate) const SLED_ERROR: ErrorCode = ErrorCode { code: "sled-error" };
    pub(crate) const PANIC: ErrorCode = ErrorCode { code: "panic" };
    pub(crate) const VIDEO_NOT_FOUND: ErrorCode = ErrorCode {
        code: "video-not-found",
    };
    pub(crate) const PERSIST_VIDEO: ErrorCode = ErrorCode {
        code: "persist-video",
    };
    pub(crate) const FILE_UPLOAD_ERROR: ErrorCode = ErrorCode {
        code: "file-upload-error",
    };
    pub(crate) const IO_ERROR: ErrorCode = ErrorCode { code: "io-error" };
    pub(crate) const VALIDATE_NO_FILES: ErrorCode = ErrorCode {
        code: "validate-no-files",
    };
    pub(crate) const VALIDATE_TOO_MANY_FILES: ErrorCode = ErrorCode {
        code: "validate-too-many-files",
    };
    pub(crate) const VALIDATE_FILE_SIZE: ErrorCode = ErrorCode {
        code: "validate-file-size",
    };
    pub(crate) const VALIDATE_CONTENT_TYPE: ErrorCode = ErrorCode {
        code: "validate-content-type",
    };
    pub(crate) const INVALID_VIDEO_ID: ErrorCode = ErrorCode {
        code: "invalid-video-id",
    };
    pub(crate) const MISSING_TOKEN: ErrorCode = ErrorCode {
        code: "missing-token",
    };
    pub(crate) const INVALID_TOKEN: ErrorCode = ErrorCode {
        code: "invalid-token",
    };
    pub(crate) const NOT_OWNER: ErrorCode = ErrorCode { code: "not-owner" };
    pub(crate) const UNKNOWN_ERROR: ErrorCode = ErrorCode {
        code: "unknown-error",
    };
}
