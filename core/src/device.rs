//! C10 (§6): the device interface.
//!
//! A device is anything a channel can issue a command to and poll for status: tape drives,
//! unit-record equipment, the high-speed (drum-class) peripherals. This crate defines the
//! contract only — no back-end implements it, per the Non-goals list; `i7080_sys.c`'s device
//! table and `i7080_chan.c`'s `chan_cmd` dispatch ground the shape of the trait and the flag
//! word below.

use proc_bitfield::bitfield;

/// Channel command codes (§6), issued with a unit number and an optional data address.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelCommand {
    ReadSelect,
    WriteSelect,
    TransferSelect,
    Rewind,
    WriteEndOfFile,
    BackspaceRecord,
    BackspaceFile,
    EraseGap,
    Run,
    SeekHigh,
    SeekLow,
}

bitfield! {
    /// Modifier bits riding alongside a [`ChannelCommand`] (`CHAN_*` in the source).
    #[derive(Clone, Copy, Eq, PartialEq)]
    pub struct ChannelModifiers(u16): Debug, FromRaw, IntoRaw, DerefRaw {
        /// Don't stop transfer at a record mark.
        pub no_record_stop: bool @ 0,
        /// Transfer full 8-bit/6-bit-plus-parity data rather than the usual 6-bit digit.
        pub eight_bit: bool @ 1,
        /// Issue as a sense command.
        pub sense: bool @ 3,
        /// Issue as a control command.
        pub control: bool @ 4,
        /// Zero memory after a write completes.
        pub zero_after_write: bool @ 5,
        /// Last address in this transfer.
        pub last_address: bool @ 6,
        /// The last character transferred was a record-count setup, not data.
        pub record_count_set: bool @ 7,
    }
}

bitfield! {
    /// Device status/flag word returned from [`Device::command`] (`DEV_*`/`CHS_*`/`CTL_*`/
    /// `STA_*` in the source, folded into one word since this crate does not model the
    /// original's separate register files for each).
    #[derive(Clone, Copy, Eq, PartialEq)]
    pub struct DeviceStatus(u16): Debug, FromRaw, IntoRaw, DerefRaw {
        /// Device selected and accepted the command.
        pub selected: bool @ 0,
        /// Device is ready to accept a write (or has data ready for a read).
        pub write_ready: bool @ 1,
        /// Device's internal buffer is full; channel should wait before the next character.
        pub buffer_full: bool @ 2,
        /// Device reached the end of its record.
        pub end_of_record: bool @ 3,
        /// Device is about to end its record (one character of lookahead).
        pub will_end_record: bool @ 4,
        /// Device wants to disconnect from the channel (transfer complete or aborted).
        pub disconnect: bool @ 5,
        /// Device raised attention (asynchronous event, e.g. operator intervention).
        pub attention: bool @ 6,
        /// Device hit logical end of file / end of tape.
        pub end_of_file: bool @ 7,
        /// Device reported an error (parity, data check, not-ready).
        pub error: bool @ 8,
        /// No device answered the selection (NODEV).
        pub no_device: bool @ 9,
    }
}

/// A transfer outcome the channel scheduler acts on each tick.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceEvent {
    /// One character moved; channel should advance its buffer pointer.
    CharacterTransferred(u8),
    /// Nothing to do this tick (device not ready yet).
    NotReady,
    /// Device has finished and wants to disconnect.
    Disconnect(DeviceStatus),
    /// Device raised attention out of band.
    Attention(DeviceStatus),
}

/// The device-interface contract every peripheral backend implements.
///
/// `command` both issues a new command (when `cmd` is `Some`) and polls an in-progress transfer
/// (when `cmd` is `None`, passing the character to write or reading the next character to
/// deliver depending on direction), matching `chan_cmd`'s combined issue/poll role in the
/// original. No backend lives in this crate — devices are supplied by an external collaborator
/// at simulation configuration time.
pub trait Device {
    /// Unit number this device answers to within its channel.
    fn unit(&self) -> u8;

    /// Issue (or continue) a command, returning the resulting device event.
    fn command(
        &mut self,
        cmd: Option<ChannelCommand>,
        modifiers: ChannelModifiers,
        outgoing: Option<u8>,
    ) -> DeviceEvent;

    /// True if this device is currently busy with a transfer (used by the scheduler's idle scan).
    fn is_busy(&self) -> bool;
}

/// Identifies a device for configuration-time conflict detection (§13): device number, the
/// channel's interrupt priority, and its service-request number.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct DeviceIdentity {
    pub device_number: u16,
    pub interrupt_priority: u8,
    pub service_request: u8,
}
