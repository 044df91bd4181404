// SPDX-License-Identifier: Apache-2.0

//! Length-delimited byte stream framing for both wire protocols.
//!
//! `Transport` is generic over any `AsyncRead + AsyncWrite` stream so the
//! same client code runs over a TCP socket or a Unix domain socket.

use bytes::{Buf, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::io::{split, AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio_util::codec::{Decoder, Encoder, Framed, FramedRead, FramedWrite};

use crate::error::ClientError;

/// `tokio_util::codec::Decoder`/`Encoder` for one bencode [`bencode::Datum`]
/// per frame. Bencode is self-delimiting, so no outer length prefix is
/// needed; `decode` simply asks the `bencode` crate whether the buffered
/// bytes hold a complete datum yet.
#[derive(Default)]
pub struct BencodeCodec;

impl Decoder for BencodeCodec {
    type Item = bencode::Datum;
    type Error = ClientError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match bencode::decode(src)? {
            Some((datum, consumed)) => {
                src.advance(consumed);
                Ok(Some(datum))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<bencode::Datum> for BencodeCodec {
    type Error = ClientError;

    fn encode(&mut self, item: bencode::Datum, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&bencode::encode(&item));
        Ok(())
    }
}

/// `Decoder`/`Encoder` for one EDN [`edn::Value`] per frame, used by the
/// E-proto client. Outgoing items are raw text expressions (already
/// rendered by the caller), not EDN values, since E-proto requests are
/// Clojure forms rather than data.
#[derive(Default)]
pub struct EdnCodec;

impl Decoder for EdnCodec {
    type Item = edn::Value;
    type Error = ClientError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match edn::decode(src)? {
            Some((value, consumed)) => {
                src.advance(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<String> for EdnCodec {
    type Error = ClientError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}

/// One protocol frame at a time over any `AsyncRead + AsyncWrite` byte
/// stream. Safe for one concurrent sender and one concurrent receiver;
/// concurrent senders must be serialized externally (the B-proto client
/// does this with a write lock).
pub struct Transport<T, C, In, Out> {
    framed: Framed<T, C>,
    _marker: std::marker::PhantomData<(In, Out)>,
}

impl<T, C, In, Out> Transport<T, C, In, Out>
where
    T: AsyncRead + AsyncWrite + Unpin,
    C: Decoder<Item = In, Error = ClientError> + Encoder<Out, Error = ClientError> + Default,
{
    pub fn new(io: T) -> Self {
        Transport {
            framed: Framed::new(io, C::default()),
            _marker: std::marker::PhantomData,
        }
    }

    pub async fn send(&mut self, item: Out) -> Result<(), ClientError> {
        self.framed.send(item).await
    }

    /// Reads the next frame, mapping a clean end-of-stream into
    /// [`ClientError::Disconnected`] rather than `Ok(None)`, since every
    /// caller in this crate treats EOS as a terminal failure.
    pub async fn receive(&mut self) -> Result<In, ClientError> {
        match self.framed.next().await {
            Some(item) => item,
            None => Err(ClientError::Disconnected),
        }
    }
}

pub type BencodeTransport<T> = Transport<T, BencodeCodec, bencode::Datum, bencode::Datum>;
pub type EdnTransport<T> = Transport<T, EdnCodec, edn::Value, String>;

/// Splits a byte stream into an independent read half and write half, each
/// framed with its own codec instance. The receive loop owns the read
/// half exclusively; the write half is shared behind a lock so `eval`,
/// `stdin`, `interrupt` and `close` can all send without colliding.
pub fn split_framed<T, C, In, Out>(
    io: T,
) -> (FramedRead<ReadHalf<T>, C>, FramedWrite<WriteHalf<T>, C>)
where
    T: AsyncRead + AsyncWrite,
    C: Decoder<Item = In, Error = ClientError> + Encoder<Out, Error = ClientError> + Default,
{
    let (read_half, write_half) = split(io);
    (
        FramedRead::new(read_half, C::default()),
        FramedWrite::new(write_half, C::default()),
    )
}

/// Reads the next frame off a `FramedRead`, mapping clean end-of-stream
/// into [`ClientError::Disconnected`].
pub async fn read_frame<R, C, In>(reader: &mut FramedRead<R, C>) -> Result<In, ClientError>
where
    R: AsyncRead + Unpin,
    C: Decoder<Item = In, Error = ClientError>,
{
    match reader.next().await {
        Some(item) => item,
        None => Err(ClientError::Disconnected),
    }
}

pub async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream, ClientError> {
    Ok(TcpStream::connect((host, port)).await?)
}

#[cfg(unix)]
pub async fn connect_unix(path: &str) -> Result<UnixStream, ClientError> {
    Ok(UnixStream::connect(path).await?)
}
