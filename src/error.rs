//! Error handling for Vibelab
//!
//! Pure timeline edits never produce errors (invalid payloads degrade to
//! no-ops). Only device, decode, resource and persistence failures surface
//! here, each with a recovery hint for the UI.

use thiserror::Error;

/// Result type alias for Vibelab operations
pub type Result<T> = std::result::Result<T, VibelabError>;

/// Main error type for Vibelab operations
#[derive(Error, Debug)]
pub enum VibelabError {
    // Decode Errors
    #[error("Failed to decode audio: {reason}")]
    DecodeFailed {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Audio contains no samples")]
    EmptyAudio,

    // Device Errors
    #[error("Audio device error: {reason}")]
    DeviceError { reason: String },

    #[error("Audio context is closed")]
    ContextClosed,

    #[error("Hardware rejected source schedule: {reason}")]
    ScheduleRejected { reason: String },

    #[error("Scheduled source not found: {id}")]
    SourceNotFound { id: u64 },

    // Resource Errors
    #[error("Microphone unavailable: {reason}")]
    MicrophoneUnavailable { reason: String },

    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("A recording is already in progress on track {track_id}")]
    RecordingInProgress { track_id: String },

    #[error("No recording in progress")]
    NotRecording,

    // Parameter Errors
    #[error("Invalid parameter {param}: {value} (expected {expected})")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Persistence Errors
    #[error("Database migration required: table '{table}' not found")]
    MigrationRequired { table: String },

    #[error("Project not found: {project_id}")]
    ProjectNotFound { project_id: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VibelabError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            VibelabError::DecodeFailed { .. } => "DECODE_FAILED",
            VibelabError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            VibelabError::EmptyAudio => "EMPTY_AUDIO",
            VibelabError::DeviceError { .. } => "DEVICE_ERROR",
            VibelabError::ContextClosed => "CONTEXT_CLOSED",
            VibelabError::ScheduleRejected { .. } => "SCHEDULE_REJECTED",
            VibelabError::SourceNotFound { .. } => "SOURCE_NOT_FOUND",
            VibelabError::MicrophoneUnavailable { .. } => "MICROPHONE_UNAVAILABLE",
            VibelabError::PermissionDenied => "PERMISSION_DENIED",
            VibelabError::RecordingInProgress { .. } => "RECORDING_IN_PROGRESS",
            VibelabError::NotRecording => "NOT_RECORDING",
            VibelabError::InvalidParameter { .. } => "INVALID_PARAMETER",
            VibelabError::InvalidConfig { .. } => "INVALID_CONFIG",
            VibelabError::MigrationRequired { .. } => "MIGRATION_REQUIRED",
            VibelabError::ProjectNotFound { .. } => "PROJECT_NOT_FOUND",
            VibelabError::Io(_) => "IO_ERROR",
            VibelabError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether the UI should show this error to the user.
    ///
    /// Transient device failures are logged and swallowed by the scheduler;
    /// decode, microphone and schema problems are actionable.
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            VibelabError::ScheduleRejected { .. } | VibelabError::SourceNotFound { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            VibelabError::DecodeFailed { .. } | VibelabError::UnsupportedFormat { .. } => vec![
                "Try converting the file to WAV format first",
                "Check if the file plays in another application",
            ],
            VibelabError::EmptyAudio => vec!["The recording or file contained no audio"],
            VibelabError::PermissionDenied => vec![
                "Allow microphone access in your system settings",
                "Then press record again",
            ],
            VibelabError::MicrophoneUnavailable { .. } => vec![
                "Check that a microphone is connected",
                "Close other applications using the microphone",
            ],
            VibelabError::RecordingInProgress { .. } => {
                vec!["Stop the current take before starting another"]
            }
            VibelabError::MigrationRequired { .. } => vec![
                "Run the database migrations before opening projects",
                "See SETUP.md for the schema",
            ],
            VibelabError::DeviceError { .. } | VibelabError::ContextClosed => vec![
                "Check the audio output device",
                "Restart playback",
            ],
            _ => vec![],
        }
    }

    /// Get a user-friendly message for this error
    pub fn friendly_message(&self) -> String {
        match self {
            VibelabError::PermissionDenied | VibelabError::MicrophoneUnavailable { .. } => {
                "Could not access microphone".to_string()
            }
            VibelabError::DecodeFailed { .. } | VibelabError::UnsupportedFormat { .. } => {
                "Failed to decode audio. Is this a supported audio file?".to_string()
            }
            VibelabError::MigrationRequired { table } => format!(
                "Database migration required: {} table not found. See SETUP.md",
                table
            ),
            _ => self.to_string(),
        }
    }
}
