//! JSON 流编解码
//!
//! 连接上是一串自定界的 JSON 值，没有长度前缀。写入时每个值后追加一个
//! 换行，读取时不依赖换行，只按 JSON 语法切分。

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, Result};
use crate::message::NetworkMessage;

const READ_CHUNK: usize = 4096;

/// 编码单条消息（不含结尾换行）
pub fn encode_message(msg: &NetworkMessage) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(msg)?;
    check_size(bytes.len())?;
    Ok(bytes)
}

/// 解码单条消息
pub fn decode_message(data: &[u8]) -> Result<NetworkMessage> {
    check_size(data.len())?;
    Ok(serde_json::from_slice(data)?)
}

fn check_size(size: usize) -> Result<()> {
    if size > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(())
}

/// 尝试从缓冲区头部解析一个完整的值
///
/// 数据不完整时返回 `Ok(None)`，成功时从缓冲区移除已消费的字节。
fn try_parse<M: DeserializeOwned>(buffer: &mut Vec<u8>) -> Result<Option<M>> {
    let skip = buffer
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(buffer.len());
    buffer.drain(..skip);
    if buffer.is_empty() {
        return Ok(None);
    }

    let parsed = {
        let mut stream = serde_json::Deserializer::from_slice(buffer).into_iter::<M>();
        match stream.next() {
            Some(Ok(value)) => Ok(Some((value, stream.byte_offset()))),
            Some(Err(e)) if e.is_eof() => Ok(None),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    };

    match parsed {
        Ok(Some((value, consumed))) => {
            buffer.drain(..consumed);
            Ok(Some(value))
        }
        Ok(None) => {
            check_size(buffer.len())?;
            Ok(None)
        }
        Err(e) => {
            // 流已损坏，丢弃剩余数据
            buffer.clear();
            Err(e.into())
        }
    }
}

/// 同步序列化器（阻塞 IO，测试与工具使用）
pub struct Serializer<R, W> {
    reader: R,
    writer: W,
    buffer: Vec<u8>,
}

impl<R: Read, W: Write> Serializer<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            buffer: Vec::new(),
        }
    }

    /// 写入一条消息
    pub fn encode(&mut self, msg: &NetworkMessage) -> Result<()> {
        let bytes = encode_message(msg)?;
        self.writer.write_all(&bytes)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// 读取一条消息，流结束时返回 `ConnectionClosed`
    pub fn decode(&mut self) -> Result<NetworkMessage> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(msg) = try_parse(&mut self.buffer)? {
                return Ok(msg);
            }
            let n = self.reader.read(&mut chunk)?;
            if n == 0 {
                return Err(ProtocolError::ConnectionClosed);
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

/// 异步消息读取器
pub struct MessageReader<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(READ_CHUNK),
        }
    }

    /// 读取下一个 JSON 值
    pub async fn read_value<M: DeserializeOwned>(&mut self) -> Result<M> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(value) = try_parse(&mut self.buffer)? {
                return Ok(value);
            }
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(ProtocolError::ConnectionClosed);
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    /// 读取下一条消息
    pub async fn recv(&mut self) -> Result<NetworkMessage> {
        self.read_value().await
    }
}

/// 异步消息写入器
pub struct MessageWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// 写入任意可序列化的值，结尾追加换行
    pub async fn write_value<M: Serialize>(&mut self, value: &M) -> Result<()> {
        let mut bytes = serde_json::to_vec(value)?;
        check_size(bytes.len())?;
        bytes.push(b'\n');

        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// 发送一条消息
    pub async fn send(&mut self, msg: &NetworkMessage) -> Result<()> {
        self.write_value(msg).await
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
