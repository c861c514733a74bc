//! Layout constants and block type bit fields of OPUS files.

/// The four bytes every OPUS file starts with
pub const MAGIC: [u8; 4] = [0x0A, 0x0A, 0xFE, 0xFE];

/// The length of the fixed header preceding the first directory entry
pub const HEADER_LENGTH: usize = 24;

/// Offset of the `f64` program version number
pub const VERSION_OFFSET: usize = 4;
/// Offset of the `u32` absolute directory offset
pub const DIRECTORY_POINTER_OFFSET: usize = 12;
/// Offset of the `u32` directory capacity
pub const MAX_BLOCKS_OFFSET: usize = 16;
/// Offset of the `u32` number of directory entries in use
pub const NUM_BLOCKS_OFFSET: usize = 20;

/// Type, length in words and offset, each a `u32`
pub const DIRECTORY_ENTRY_LENGTH: usize = 12;

/// Block lengths are counted in 32-bit words
pub const WORD_SIZE: usize = 4;

/// Placeholder directory entries carry this type
pub const BLOCK_TYPE_DUMMY: u32 = 0;

/// The history/log text block
pub const BLOCK_TYPE_TEXT: u32 = 0x4068_0000;

/// Masks the block type down to the bits that identify a spectrum
pub const BLOCK_TYPE_SPEC_MASK: u32 = 0x000F_FFFF;

/// The masked block type of the main absorbance spectrum
pub const BLOCK_TYPE_MAIN: u32 = 0x100F;

/// Setting this bit on a data block type gives the type of its data status
/// parameter block
pub const BLOCK_TYPE_INCREMENT_DATA_TO_DPF: u32 = 0x10;

pub const COMPLEX_MASK: u32 = 0x0000_0003;
pub const CHANNEL_SHIFT: u32 = 2;
pub const CHANNEL_MASK: u32 = 0x3;
pub const PARAMETER_SHIFT: u32 = 4;
pub const PARAMETER_MASK: u32 = 0x3F;
pub const DATA_SHIFT: u32 = 10;
pub const DATA_MASK: u32 = 0x3F;
pub const TEXT_SHIFT: u32 = 16;
pub const TEXT_MASK: u32 = 0xFF;

/// The text kind of the history block
pub const TEXT_KIND_HISTORY: u32 = 0x68;
/// The text kind of the info block, which is laid out like a parameter block
pub const TEXT_KIND_INFO: u32 = 0x08;

/// The key that terminates a parameter block
pub const PARAMETER_END: &[u8; 3] = b"END";
/// Key, NUL, type and size
pub const PARAMETER_HEADER_LENGTH: usize = 8;

pub const NPT: &str = "NPT";
pub const FXV: &str = "FXV";
pub const LXV: &str = "LXV";
pub const CSF: &str = "CSF";
pub const INS: &str = "INS";

/// Marks a history entry holding a recorded command line
pub const KEYWORD_CMDLINE: &str = "COMMAND_LINE";

/// The command line operation holding the sample ID
pub const OPERATION_MEASURE_SAMPLE: &str = "MeasureSample";

/// The key for the sample ID
pub const KEY_SAMPLE_ID: &str = "SNM";

/// The reserved sample data key naming a spectrum's channel
pub const FIELD_CHANNEL: &str = "channel";
/// Where recoverable decoding anomalies are recorded
pub const FIELD_OPUS_WARNING: &str = "Opus.Warning";
pub const FIELD_OPUS_FIRST_X: &str = "Opus.FirstX";
pub const FIELD_OPUS_LAST_X: &str = "Opus.LastX";
pub const FIELD_OPUS_NUM_POINTS: &str = "Opus.NumPoints";
pub const FIELD_OPUS_DIFF: &str = "Opus.Diff";
pub const FIELD_OPUS_SCALE: &str = "Opus.Scale";
pub const FIELD_OPUS_BLOCK_TYPE_DPF: &str = "Opus.BlockType.DPF";
pub const FIELD_OPUS_BLOCK_TYPE_HEX: &str = "Opus.BlockType.Hex";
pub const FIELD_OPUS_LOG: &str = "Opus.Log";
pub const PREFIX_OPUS: &str = "Opus.";
pub const PREFIX_TRACE: &str = "Trace.";
