// SPDX-License-Identifier: Apache-2.0

//! The B-proto (length-delimited, bencode-framed) client: session
//! lifecycle, op dispatch, the pending-id table, and status demux.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use bencode::Datum;
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::debug;

use crate::client::EvalClient;
use crate::error::ClientError;
use crate::ids::{IdGen, UuidIdGen};
use crate::result::EvalResult;
use crate::sink::{NullSink, OutputSink};
use crate::transport::{read_frame, split_framed, BencodeCodec};

/// id for the synchronous `clone` request issued during session init.
const INIT_ID: &str = "init";

struct State {
    pending: HashMap<String, mpsc::Sender<EvalResult>>,
    input_buffer: Option<String>,
    input_requested: bool,
    current_ns: String,
}

struct Inner<T> {
    writer: Mutex<FramedWrite<WriteHalf<T>, BencodeCodec>>,
    state: Mutex<State>,
    session_id: Option<String>,
    supported_ops: HashSet<String>,
    oneshot: bool,
    debug: bool,
    sink: Arc<dyn OutputSink>,
    id_gen: Box<dyn IdGen>,
}

/// A connected B-proto client. Generic over any `AsyncRead + AsyncWrite`
/// byte stream (TCP or Unix domain socket).
pub struct NreplClient<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for NreplClient<T> {
    fn clone(&self) -> Self {
        NreplClient {
            inner: self.inner.clone(),
        }
    }
}

/// Configuration accepted by [`NreplClient::connect`]. Kept as a builder
/// struct rather than a long parameter list since most fields have
/// sensible production defaults.
pub struct NreplOptions {
    pub oneshot: bool,
    pub debug: bool,
    pub sink: Arc<dyn OutputSink>,
    pub id_gen: Box<dyn IdGen>,
}

impl Default for NreplOptions {
    fn default() -> Self {
        NreplOptions {
            oneshot: false,
            debug: false,
            sink: Arc::new(NullSink),
            id_gen: Box::new(UuidIdGen),
        }
    }
}

impl<T> NreplClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub async fn connect(io: T, options: NreplOptions) -> Result<Self, ClientError> {
        let (mut reader, mut writer) = split_framed::<_, BencodeCodec, _, _>(io);

        let mut session_id = None;
        let mut supported_ops = HashSet::new();

        if !options.oneshot {
            Self::send_frame(
                &mut writer,
                Datum::dict([("op", Datum::from("clone")), ("id", Datum::from(INIT_ID))]),
                options.debug,
            )
            .await?;
            let resp = Self::receive_frame(&mut reader, options.debug).await?;
            let sid = resp
                .get("new-session")
                .and_then(Datum::as_str)
                .ok_or_else(|| ClientError::IllegalSession("missing new-session".into()))?
                .to_string();
            session_id = Some(sid);

            Self::send_frame(&mut writer, Datum::dict([("op", Datum::from("describe"))]), options.debug)
                .await?;
            let resp = Self::receive_frame(&mut reader, options.debug).await?;
            if let Some(ops) = resp.get("ops").and_then(Datum::as_dict) {
                supported_ops = ops
                    .keys()
                    .map(|k| String::from_utf8_lossy(k).into_owned())
                    .collect();
            }
        }

        let inner = Arc::new(Inner {
            writer: Mutex::new(writer),
            state: Mutex::new(State {
                pending: HashMap::new(),
                input_buffer: None,
                input_requested: false,
                current_ns: "user".to_string(),
            }),
            session_id,
            supported_ops,
            oneshot: options.oneshot,
            debug: options.debug,
            sink: options.sink,
            id_gen: options.id_gen,
        });

        let loop_inner = inner.clone();
        tokio::spawn(async move {
            Self::receive_loop(loop_inner, reader).await;
        });

        Ok(NreplClient { inner })
    }

    async fn send_frame(
        writer: &mut FramedWrite<WriteHalf<T>, BencodeCodec>,
        datum: Datum,
        debug_enabled: bool,
    ) -> Result<(), ClientError> {
        if debug_enabled {
            debug!(wire = "send", frame = %datum);
        }
        use futures::SinkExt;
        writer.send(datum).await
    }

    async fn receive_frame(
        reader: &mut FramedRead<ReadHalf<T>, BencodeCodec>,
        debug_enabled: bool,
    ) -> Result<Datum, ClientError> {
        let datum = read_frame(reader).await?;
        if debug_enabled {
            debug!(wire = "recv", frame = %datum);
        }
        Ok(datum)
    }

    async fn receive_loop(inner: Arc<Inner<T>>, mut reader: FramedRead<ReadHalf<T>, BencodeCodec>) {
        loop {
            let datum = match Self::receive_frame(&mut reader, inner.debug).await {
                Ok(datum) => datum,
                Err(err) => {
                    debug!(error = %err, "nrepl receive loop terminating");
                    inner.state.lock().await.pending.clear();
                    return;
                }
            };
            Self::dispatch(&inner, datum).await;
        }
    }

    async fn dispatch(inner: &Arc<Inner<T>>, frame: Datum) {
        let id = frame.get("id").and_then(Datum::as_str).map(str::to_owned);

        if let Some(ns) = frame.get("ns").and_then(Datum::as_str) {
            inner.state.lock().await.current_ns = ns.to_string();
        }

        if let Some(value) = frame.get("value").and_then(Datum::as_str) {
            Self::deliver(inner, id.as_deref(), EvalResult::Value(value.to_string())).await;
        }

        if let Some(ex) = frame.get("ex").and_then(Datum::as_str) {
            Self::deliver(inner, id.as_deref(), EvalResult::RuntimeError(ex.to_string())).await;
        }

        if let Some(out) = frame.get("out").and_then(Datum::as_str) {
            inner.sink.write_out(out);
        }

        if let Some(err) = frame.get("err").and_then(Datum::as_str) {
            inner.sink.write_err(err);
        }

        let statuses: Vec<String> = frame
            .get("status")
            .and_then(Datum::as_list)
            .map(|list| {
                list.iter()
                    .filter_map(Datum::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        if statuses.iter().any(|s| s == "need-input") {
            Self::handle_need_input(inner).await;
        }

        if statuses.iter().any(|s| s == "done") {
            if let Some(id) = &id {
                inner.state.lock().await.pending.remove(id);
            }
        }
    }

    async fn deliver(inner: &Arc<Inner<T>>, id: Option<&str>, result: EvalResult) {
        let Some(id) = id else { return };
        let sender = inner.state.lock().await.pending.get(id).cloned();
        if let Some(sender) = sender {
            let _ = sender.send(result).await;
        }
    }

    async fn handle_need_input(inner: &Arc<Inner<T>>) {
        let buffered = {
            let mut state = inner.state.lock().await;
            match state.input_buffer.take() {
                Some(buf) if !buf.is_empty() => Some(buf),
                _ => {
                    state.input_requested = true;
                    None
                }
            }
        };
        if let Some(buf) = buffered {
            let _ = Self::send_stdin(inner, buf).await;
        }
    }

    async fn send_stdin(inner: &Arc<Inner<T>>, input: String) -> Result<(), ClientError> {
        let request = Self::build_request(inner, "stdin", vec![("stdin", Datum::from(input))]);
        let mut writer = inner.writer.lock().await;
        Self::send_frame(&mut writer, request, inner.debug).await
    }

    fn build_request(inner: &Inner<T>, op: &str, mut extra: Vec<(&str, Datum)>) -> Datum {
        let mut pairs: Vec<(String, Datum)> = vec![("op".to_string(), Datum::from(op))];
        for (k, v) in extra.drain(..) {
            pairs.push((k.to_string(), v));
        }
        if let Some(session) = &inner.session_id {
            pairs.push(("session".to_string(), Datum::from(session.as_str())));
        }
        Datum::dict(pairs)
    }

    async fn start_eval(
        &self,
        op: &str,
        extra: Vec<(&str, Datum)>,
    ) -> Result<mpsc::Receiver<EvalResult>, ClientError> {
        let id = self.inner.id_gen.next_id();
        let (tx, rx) = mpsc::channel(16);
        let ns = {
            let mut state = self.inner.state.lock().await;
            let ns = state.current_ns.clone();
            state.pending.insert(id.clone(), tx);
            ns
        };
        let mut pairs = extra;
        pairs.push(("id", Datum::from(id.as_str())));
        pairs.push(("ns", Datum::from(ns.as_str())));
        let request = Self::build_request(&self.inner, op, pairs);
        let mut writer = self.inner.writer.lock().await;
        Self::send_frame(&mut writer, request, self.inner.debug).await?;
        Ok(rx)
    }
}

impl<T> EvalClient for NreplClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static,
{
    fn eval<'a>(
        &'a self,
        code: &'a str,
    ) -> BoxFuture<'a, Result<mpsc::Receiver<EvalResult>, ClientError>> {
        Box::pin(async move { self.start_eval("eval", vec![("code", Datum::from(code))]).await })
    }

    fn load<'a>(
        &'a self,
        filename: &'a str,
        content: &'a str,
    ) -> BoxFuture<'a, Result<mpsc::Receiver<EvalResult>, ClientError>> {
        Box::pin(async move {
            let mut extra = vec![("file", Datum::from(content))];
            if filename != "-" {
                let path = Path::new(filename);
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    extra.push(("file-name", Datum::from(name)));
                }
                let dir = path
                    .parent()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                extra.push(("file-path", Datum::from(dir.as_str())));
            }
            self.start_eval("load-file", extra).await
        })
    }

    fn stdin<'a>(&'a self, input: &'a str) -> BoxFuture<'a, Result<(), ClientError>> {
        let inner = self.inner.clone();
        let input = input.to_string();
        Box::pin(async move {
            let should_send = {
                let mut state = inner.state.lock().await;
                state
                    .input_buffer
                    .get_or_insert_with(String::new)
                    .push_str(&input);
                if state.input_requested {
                    state.input_requested = false;
                    state.input_buffer.take()
                } else {
                    None
                }
            };
            if let Some(buf) = should_send {
                Self::send_stdin(&inner, buf).await?;
            }
            Ok(())
        })
    }

    fn interrupt(&self) -> BoxFuture<'_, Result<(), ClientError>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let ids: Vec<String> = inner.state.lock().await.pending.keys().cloned().collect();
            for id in ids {
                let request = Self::build_request(
                    &inner,
                    "interrupt",
                    vec![("interrupt-id", Datum::from(id.as_str()))],
                );
                let mut writer = inner.writer.lock().await;
                Self::send_frame(&mut writer, request, inner.debug).await?;
            }
            Ok(())
        })
    }

    fn supports_op(&self, name: &str) -> bool {
        !self.inner.oneshot && self.inner.supported_ops.contains(name)
    }

    fn close(&self) -> BoxFuture<'_, Result<(), ClientError>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if inner.session_id.is_some() {
                let request = Self::build_request(&inner, "close", vec![]);
                let mut writer = inner.writer.lock().await;
                if let Err(err) = Self::send_frame(&mut writer, request, inner.debug).await {
                    debug!(error = %err, "best-effort close op failed");
                }
            }
            let mut writer = inner.writer.lock().await;
            let _ = writer.get_mut().shutdown().await;
            Ok(())
        })
    }

    fn current_ns(&self) -> String {
        // Cheap snapshot: a blocking_lock-free approximation via try_lock,
        // falling back to "user" if the state lock is momentarily held.
        // The REPL only calls this between prompts, when no eval is
        // in-flight, so contention is not expected.
        self.inner
            .state
            .try_lock()
            .map(|s| s.current_ns.clone())
            .unwrap_or_else(|_| "user".to_string())
    }
}
