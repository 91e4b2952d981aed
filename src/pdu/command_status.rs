use num_enum::TryFromPrimitive;

/// SMPP v3.4 `command_status` values (Table 5-2, the subset an ESME client
/// commonly encounters). The header keeps the raw `u32`; this enum exists to
/// name known codes in errors and logs.
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandStatus {
    Ok = 0x0000_0000,
    InvalidMsgLength = 0x0000_0001,
    InvalidCommandLength = 0x0000_0002,
    InvalidCommandId = 0x0000_0003,
    IncorrectBindStatus = 0x0000_0004,
    AlreadyBound = 0x0000_0005,
    InvalidPriorityFlag = 0x0000_0006,
    InvalidRegisteredDeliveryFlag = 0x0000_0007,
    SystemError = 0x0000_0008,
    InvalidSourceAddress = 0x0000_000A,
    InvalidDestinationAddress = 0x0000_000B,
    InvalidMessageId = 0x0000_000C,
    BindFailed = 0x0000_000D,
    InvalidPassword = 0x0000_000E,
    InvalidSystemId = 0x0000_000F,
    CancelSmFailed = 0x0000_0011,
    ReplaceSmFailed = 0x0000_0013,
    MessageQueueFull = 0x0000_0014,
    InvalidServiceType = 0x0000_0015,
    InvalidNumberOfDests = 0x0000_0033,
    InvalidDistributionList = 0x0000_0034,
    InvalidDestFlag = 0x0000_0040,
    InvalidEsmClass = 0x0000_0043,
    SubmitToDistributionListFailed = 0x0000_0044,
    SubmitFailed = 0x0000_0045,
    InvalidSourceTon = 0x0000_0048,
    InvalidSourceNpi = 0x0000_0049,
    InvalidDestTon = 0x0000_0050,
    InvalidDestNpi = 0x0000_0051,
    InvalidSystemType = 0x0000_0053,
    InvalidReplaceIfPresentFlag = 0x0000_0054,
    InvalidNumberOfMessages = 0x0000_0055,
    ThrottlingError = 0x0000_0058,
    InvalidScheduledDeliveryTime = 0x0000_0061,
    InvalidValidityPeriod = 0x0000_0062,
    QuerySmFailed = 0x0000_0067,
    InvalidOptionalPart = 0x0000_00C0,
    OptionalParameterNotAllowed = 0x0000_00C1,
    InvalidParameterLength = 0x0000_00C2,
    ExpectedOptionalParameterMissing = 0x0000_00C3,
    InvalidOptionalParameterValue = 0x0000_00C4,
    DeliveryFailure = 0x0000_00FE,
    UnknownError = 0x0000_00FF,
}

/// Render a raw status for error messages: the known name, or the hex code
/// for vendor-specific values.
pub fn status_name(status: u32) -> String {
    match CommandStatus::try_from(status) {
        Ok(known) => format!("{known:?}"),
        Err(_) => format!("{status:#010x}"),
    }
}
