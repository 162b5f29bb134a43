//! Binary framing for the archival RPC interface.
//!
//! Every request is one frame: `rpc id (u16) ‖ length (u32) ‖ body`,
//! all big-endian, the body being the prost encoding of the request
//! message. The reply frame is `status (u8) ‖ length (u32) ‖ body`; on
//! a non-zero status the body is a UTF-8 error message instead of a
//! response message.
//!
//! Client-streaming endpoints (the archive ones) follow their opening
//! frame with a sequence of `length (u32) ‖ body` items; the sentinel
//! length [`STREAM_END`] terminates the sequence, after which the
//! server sends its single reply frame.

use core::fmt;

use prost::Message;
use snafu::{ResultExt as _, Snafu};
use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _};
use tokio::net::TcpStream;

/// Requests are smaller, because they are initiated by an unknown side.
pub const MAX_REQUEST_SIZE: u32 = 1024 * 1024;

/// Streamed entries can carry full comment/like threads.
pub const MAX_STREAM_ITEM_SIZE: u32 = 8 * 1024 * 1024;

pub const MAX_RESPONSE_SIZE: u32 = 32 * 1024 * 1024;

/// Length sentinel closing a client stream. An empty message encodes to
/// zero bytes, so zero cannot be used.
pub const STREAM_END: u32 = u32::MAX;

/// Raw rpc id as read off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RpcId(pub u16);

impl RpcId {
    pub fn to_known(self) -> Option<RpcIdKnown> {
        RpcIdKnown::from_u16(self.0)
    }
}

impl fmt::Display for RpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RpcIdKnown> for RpcId {
    fn from(known: RpcIdKnown) -> Self {
        RpcId(known as u16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RpcIdKnown {
    PostFeedinfo = 1,
    FetchProfile = 2,
    FetchFeedinfo = 3,
    FetchGraph = 4,
    FetchFeed = 5,
    FetchEntry = 6,
    ArchiveFeed = 7,
    ForceArchiveFeed = 8,
    PostEntry = 9,
    LikeEntry = 10,
    CommentEntry = 11,
    DeleteComment = 12,
    EnqueJob = 13,
    GetFeedJob = 14,
    FinishJob = 15,
    Auth = 16,
    PutOauth = 17,
    BindUserFeed = 18,
    DeleteService = 19,
    Command = 20,
}

impl RpcIdKnown {
    pub fn from_u16(raw: u16) -> Option<Self> {
        Some(match raw {
            1 => Self::PostFeedinfo,
            2 => Self::FetchProfile,
            3 => Self::FetchFeedinfo,
            4 => Self::FetchGraph,
            5 => Self::FetchFeed,
            6 => Self::FetchEntry,
            7 => Self::ArchiveFeed,
            8 => Self::ForceArchiveFeed,
            9 => Self::PostEntry,
            10 => Self::LikeEntry,
            11 => Self::CommentEntry,
            12 => Self::DeleteComment,
            13 => Self::EnqueJob,
            14 => Self::GetFeedJob,
            15 => Self::FinishJob,
            16 => Self::Auth,
            17 => Self::PutOauth,
            18 => Self::BindUserFeed,
            19 => Self::DeleteService,
            20 => Self::Command,
            _ => return None,
        })
    }
}

/// Reply status byte. Everything except `DeadlineExceeded` is
/// non-retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    NotFound = 1,
    AlreadyExists = 2,
    InvalidArgument = 3,
    Unauthorized = 4,
    DeadlineExceeded = 5,
    Unavailable = 6,
    Internal = 7,
}

impl Status {
    pub fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Ok,
            1 => Self::NotFound,
            2 => Self::AlreadyExists,
            3 => Self::InvalidArgument,
            4 => Self::Unauthorized,
            5 => Self::DeadlineExceeded,
            6 => Self::Unavailable,
            7 => Self::Internal,
            _ => return None,
        })
    }

    pub fn is_retryable(self) -> bool {
        self == Self::DeadlineExceeded
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::InvalidArgument => "invalid argument",
            Self::Unauthorized => "unauthorized",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Snafu)]
pub enum WireError {
    Connect {
        source: std::io::Error,
    },
    Write {
        source: std::io::Error,
    },
    Read {
        source: std::io::Error,
    },
    MessageTooLarge {
        len: u32,
        limit: u32,
    },
    Decoding {
        source: prost::DecodeError,
    },
    #[snafu(display("Unknown status byte {code}"))]
    UnknownStatus {
        code: u8,
    },
    /// Other side replied with a failure status.
    #[snafu(display("Remote error ({status}): {message}"))]
    Remote {
        status: Status,
        message: String,
    },
}

pub type WireResult<T> = std::result::Result<T, WireError>;

pub async fn write_request<W, M>(w: &mut W, id: RpcIdKnown, msg: &M) -> WireResult<()>
where
    W: AsyncWrite + Unpin,
    M: Message,
{
    let body = msg.encode_to_vec();
    w.write_u16(id as u16).await.context(WriteSnafu)?;
    w.write_u32(body.len() as u32).await.context(WriteSnafu)?;
    w.write_all(&body).await.context(WriteSnafu)?;
    w.flush().await.context(WriteSnafu)?;
    Ok(())
}

pub async fn read_request<R>(r: &mut R) -> WireResult<(RpcId, Vec<u8>)>
where
    R: AsyncRead + Unpin,
{
    let id = RpcId(r.read_u16().await.context(ReadSnafu)?);
    let len = r.read_u32().await.context(ReadSnafu)?;
    if MAX_REQUEST_SIZE < len {
        return MessageTooLargeSnafu {
            len,
            limit: MAX_REQUEST_SIZE,
        }
        .fail();
    }
    let mut body = vec![0u8; len as usize];
    r.read_exact(&mut body).await.context(ReadSnafu)?;
    Ok((id, body))
}

pub async fn write_response<W>(w: &mut W, status: Status, payload: &[u8]) -> WireResult<()>
where
    W: AsyncWrite + Unpin,
{
    w.write_u8(status as u8).await.context(WriteSnafu)?;
    w.write_u32(payload.len() as u32).await.context(WriteSnafu)?;
    w.write_all(payload).await.context(WriteSnafu)?;
    w.flush().await.context(WriteSnafu)?;
    Ok(())
}

pub async fn read_response<R>(r: &mut R) -> WireResult<(Status, Vec<u8>)>
where
    R: AsyncRead + Unpin,
{
    let code = r.read_u8().await.context(ReadSnafu)?;
    let status = Status::from_u8(code).ok_or(WireError::UnknownStatus { code })?;
    let len = r.read_u32().await.context(ReadSnafu)?;
    if MAX_RESPONSE_SIZE < len {
        return MessageTooLargeSnafu {
            len,
            limit: MAX_RESPONSE_SIZE,
        }
        .fail();
    }
    let mut body = vec![0u8; len as usize];
    r.read_exact(&mut body).await.context(ReadSnafu)?;
    Ok((status, body))
}

pub async fn write_stream_item<W, M>(w: &mut W, msg: &M) -> WireResult<()>
where
    W: AsyncWrite + Unpin,
    M: Message,
{
    let body = msg.encode_to_vec();
    w.write_u32(body.len() as u32).await.context(WriteSnafu)?;
    w.write_all(&body).await.context(WriteSnafu)?;
    w.flush().await.context(WriteSnafu)?;
    Ok(())
}

pub async fn write_stream_end<W>(w: &mut W) -> WireResult<()>
where
    W: AsyncWrite + Unpin,
{
    w.write_u32(STREAM_END).await.context(WriteSnafu)?;
    w.flush().await.context(WriteSnafu)?;
    Ok(())
}

/// Read one streamed item, or `None` when the sender closed the stream.
pub async fn read_stream_item<R>(r: &mut R) -> WireResult<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let len = r.read_u32().await.context(ReadSnafu)?;
    if len == STREAM_END {
        return Ok(None);
    }
    if MAX_STREAM_ITEM_SIZE < len {
        return MessageTooLargeSnafu {
            len,
            limit: MAX_STREAM_ITEM_SIZE,
        }
        .fail();
    }
    let mut body = vec![0u8; len as usize];
    r.read_exact(&mut body).await.context(ReadSnafu)?;
    Ok(Some(body))
}

/// Client side of the archival RPC interface, one request at a time
/// over a single TCP connection.
pub struct Connection {
    stream: TcpStream,
}

#[cfg(test)]
mod tests;

impl Connection {
    pub async fn connect(addr: &str) -> WireResult<Self> {
        let stream = TcpStream::connect(addr).await.context(ConnectSnafu)?;
        Ok(Self { stream })
    }

    pub async fn call<Req, Resp>(&mut self, id: RpcIdKnown, req: &Req) -> WireResult<Resp>
    where
        Req: Message,
        Resp: Message + Default,
    {
        write_request(&mut self.stream, id, req).await?;
        let (status, payload) = read_response(&mut self.stream).await?;
        if status != Status::Ok {
            return RemoteSnafu {
                status,
                message: String::from_utf8_lossy(&payload).into_owned(),
            }
            .fail();
        }
        Resp::decode(payload.as_slice()).context(DecodingSnafu)
    }

    /// Stream entries into the archive and collect the summary.
    pub async fn archive_feed(
        &mut self,
        force: bool,
        entries: &[crate::model::Entry],
    ) -> WireResult<crate::model::FeedSummary> {
        let id = if force {
            RpcIdKnown::ForceArchiveFeed
        } else {
            RpcIdKnown::ArchiveFeed
        };
        write_request(&mut self.stream, id, &()).await?;
        for entry in entries {
            write_stream_item(&mut self.stream, entry).await?;
        }
        write_stream_end(&mut self.stream).await?;

        let (status, payload) = read_response(&mut self.stream).await?;
        if status != Status::Ok {
            return RemoteSnafu {
                status,
                message: String::from_utf8_lossy(&payload).into_owned(),
            }
            .fail();
        }
        crate::model::FeedSummary::decode(payload.as_slice()).context(DecodingSnafu)
    }
}
