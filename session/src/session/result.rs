/// Outcome of a connection attempt, carried in CONNECTION_REJECTED
/// frames and handed to [`SessionHandler::on_connect_result`].
///
/// Earlier revisions of the protocol used `2` for both a password
/// mismatch and a full server; `ServerFull` now has its own value, so a
/// peer speaking the old dialect reports a full server as a password
/// failure.
///
/// [`SessionHandler::on_connect_result`]: crate::SessionHandler::on_connect_result
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectResult {
    Succeeded = 0,
    InvalidProtocol = 1,
    InvalidPassword = 2,
    ServerFull = 3,
}

impl From<ConnectResult> for u32 {
    fn from(result: ConnectResult) -> u32 {
        result as u32
    }
}

impl TryFrom<u32> for ConnectResult {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, ()> {
        match value {
            0 => Ok(ConnectResult::Succeeded),
            1 => Ok(ConnectResult::InvalidProtocol),
            2 => Ok(ConnectResult::InvalidPassword),
            3 => Ok(ConnectResult::ServerFull),
            _ => Err(()),
        }
    }
}
