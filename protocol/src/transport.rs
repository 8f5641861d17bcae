//! 传输层抽象
//!
//! 提供 Connector/Connection/Listener traits 使上层逻辑与具体传输实现解耦。

use async_trait::async_trait;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::codec::{MessageReader, MessageWriter};
use crate::constants::CONNECT_TIMEOUT;
use crate::error::{ProtocolError, Result};
use crate::message::NetworkMessage;

/// 连接抽象 trait
#[async_trait]
pub trait Connection: Send + Sync {
    /// 发送消息
    async fn send(&mut self, msg: &NetworkMessage) -> Result<()>;

    /// 接收消息
    async fn recv(&mut self) -> Result<NetworkMessage>;

    /// 关闭连接
    async fn close(&mut self) -> Result<()>;

    /// 获取远端地址
    fn peer_addr(&self) -> Option<String>;
}

/// 连接器 trait（客户端使用）
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Connection;

    /// 建立连接
    async fn connect(&self, addr: &str) -> Result<Self::Conn>;
}

/// 监听器 trait（服务端使用）
#[async_trait]
pub trait Listener: Send + Sync + Sized {
    type Conn: Connection;

    /// 绑定地址
    async fn bind(addr: &str) -> Result<Self>;

    /// 接受连接
    async fn accept(&mut self) -> Result<Self::Conn>;

    /// 获取本地地址
    fn local_addr(&self) -> Option<String>;
}

// ============================================================================
// TCP 实现
// ============================================================================

/// TCP 连接器
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Conn = TcpConnection;

    async fn connect(&self, addr: &str) -> Result<Self::Conn> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| ProtocolError::ConnectionTimeout)?
            .map_err(ProtocolError::Io)?;

        TcpConnection::from_stream(stream)
    }
}

/// TCP 连接
pub struct TcpConnection {
    reader: MessageReader<OwnedReadHalf>,
    writer: MessageWriter<OwnedWriteHalf>,
    peer_addr: Option<String>,
}

impl TcpConnection {
    /// 从 TcpStream 创建
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr().ok().map(|a| a.to_string());
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: MessageReader::new(read_half),
            writer: MessageWriter::new(write_half),
            peer_addr,
        })
    }

    /// 分离读写端（服务端按连接拆成读、写两个任务）
    pub fn split(self) -> (MessageReader<OwnedReadHalf>, MessageWriter<OwnedWriteHalf>) {
        (self.reader, self.writer)
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send(&mut self, msg: &NetworkMessage) -> Result<()> {
        self.writer.send(msg).await
    }

    async fn recv(&mut self) -> Result<NetworkMessage> {
        self.reader.recv().await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await
    }

    fn peer_addr(&self) -> Option<String> {
        self.peer_addr.clone()
    }
}

/// TCP 监听器
pub struct TcpListener {
    listener: tokio::net::TcpListener,
}

#[async_trait]
impl Listener for TcpListener {
    type Conn = TcpConnection;

    async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(ProtocolError::Io)?;
        Ok(Self { listener })
    }

    async fn accept(&mut self) -> Result<Self::Conn> {
        let (stream, _addr) = self.listener.accept().await.map_err(ProtocolError::Io)?;
        TcpConnection::from_stream(stream)
    }

    fn local_addr(&self) -> Option<String> {
        self.listener.local_addr().ok().map(|a| a.to_string())
    }
}
