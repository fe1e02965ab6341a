//! Pull-based text stages between the response body and the tree sink.
//!
//! Each stage asks its input for the next chunk only after the current one
//! has been handed downstream.

use crate::error::LoadError;
use futures::stream::{self, LocalBoxStream};
use futures::StreamExt;
use html::ChunkTransform;
use net::ByteStream;
use tools::utf8::Utf8Decoder;

pub type TextStream = LocalBoxStream<'static, Result<String, LoadError>>;

struct Decode {
    input: ByteStream,
    decoder: Utf8Decoder,
    done: bool,
}

/// UTF-8 decode a byte stream. Sequences split across chunks are carried;
/// invalid bytes become U+FFFD.
pub fn decode(body: ByteStream) -> TextStream {
    let state = Decode {
        input: body,
        decoder: Utf8Decoder::new(),
        done: false,
    };
    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        loop {
            match state.input.next().await {
                Some(Ok(bytes)) => {
                    let text = state.decoder.push(&bytes);
                    if !text.is_empty() {
                        return Some((Ok(text), state));
                    }
                }
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(LoadError::Fetch(err)), state));
                }
                None => {
                    state.done = true;
                    let tail = state.decoder.finish();
                    return (!tail.is_empty()).then_some((Ok(tail), state));
                }
            }
        }
    })
    .boxed_local()
}

struct Stage {
    input: TextStream,
    transform: Box<dyn ChunkTransform>,
    done: bool,
}

/// Run `transform` over every chunk of `input`, flushing it at end of stream.
///
/// An input error is forwarded and ends the stage without flushing.
pub fn through(input: TextStream, transform: Box<dyn ChunkTransform>) -> TextStream {
    let state = Stage {
        input,
        transform,
        done: false,
    };
    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        loop {
            match state.input.next().await {
                Some(Ok(chunk)) => {
                    let out = state.transform.push(&chunk);
                    if !out.is_empty() {
                        return Some((Ok(out), state));
                    }
                }
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.done = true;
                    let tail = state.transform.finish();
                    return (!tail.is_empty()).then_some((Ok(tail), state));
                }
            }
        }
    })
    .boxed_local()
}
