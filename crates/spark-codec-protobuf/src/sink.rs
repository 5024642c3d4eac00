//! 编码阶段的字节写入端。
//!
//! ## 契约（What）
//! - [`WireSink::write`] 返回实际接收的字节数；少于提交量视为 [`WireError::ShortWrite`]，
//!   部分写入的恢复由写入端自身负责；
//! - 长度遍历从不触碰写入端。

use bytes::BytesMut;

use crate::error::{Result, WireError};
use crate::wire::{MAX_VARINT_LEN, WireType, encode_varint, make_tag};

/// 编码输出的目标。
pub trait WireSink {
    /// 写入 `bytes`，返回实际接收的字节数。
    fn write(&mut self, bytes: &[u8]) -> Result<usize>;
}

impl WireSink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        self.extend_from_slice(bytes);
        Ok(bytes.len())
    }
}

impl WireSink for BytesMut {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        self.extend_from_slice(bytes);
        Ok(bytes.len())
    }
}

impl<S> WireSink for &mut S
where
    S: WireSink + ?Sized,
{
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        (**self).write(bytes)
    }
}

/// 将 [`std::io::Write`] 适配为写入端。
///
/// 管道、套接字等写入器单次可能只接收部分字节，适配层以 `write_all` 重试至全部写出；
/// 写入器返回 `Ok(0)` 时以 [`WireError::Io`] 失败。
#[derive(Debug)]
pub struct IoSink<W> {
    inner: W,
}

impl<W> IoSink<W>
where
    W: std::io::Write,
{
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W> WireSink for IoSink<W>
where
    W: std::io::Write,
{
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        self.inner.write_all(bytes)?;
        Ok(bytes.len())
    }
}

/// 统计写出字节数的包装层，编码路径依赖它校验长度前缀。
pub struct CountingSink<'a> {
    inner: &'a mut dyn WireSink,
    written: u64,
}

impl<'a> CountingSink<'a> {
    pub fn new(inner: &'a mut dyn WireSink) -> Self {
        Self { inner, written: 0 }
    }

    /// 迄今为止写出的字节数。
    pub fn written(&self) -> u64 {
        self.written
    }

    /// 写入全部字节；写入端少收即失败。
    pub fn put(&mut self, bytes: &[u8]) -> Result<()> {
        let written = self.inner.write(bytes)?;
        self.written += written as u64;
        if written != bytes.len() {
            return Err(WireError::ShortWrite {
                requested: bytes.len(),
                written,
            });
        }
        Ok(())
    }

    pub fn put_varint(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let encoded = encode_varint(value, &mut buf);
        self.put(encoded)
    }

    pub fn put_tag(&mut self, number: u32, wire_type: WireType) -> Result<()> {
        self.put_varint(make_tag(number, wire_type))
    }

    pub fn put_fixed32(&mut self, value: u32) -> Result<()> {
        self.put(&value.to_le_bytes())
    }

    pub fn put_fixed64(&mut self, value: u64) -> Result<()> {
        self.put(&value.to_le_bytes())
    }

    /// varint 长度前缀后紧跟原始字节。
    pub fn put_length_delimited(&mut self, bytes: &[u8]) -> Result<()> {
        self.put_varint(bytes.len() as u64)?;
        self.put(bytes)
    }
}

impl WireSink for CountingSink<'_> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let written = self.inner.write(bytes)?;
        self.written += written as u64;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 每次最多接收 `limit` 字节的写入端。
    struct Trickle {
        limit: usize,
        out: Vec<u8>,
    }

    impl WireSink for Trickle {
        fn write(&mut self, bytes: &[u8]) -> Result<usize> {
            let n = bytes.len().min(self.limit);
            self.out.extend_from_slice(&bytes[..n]);
            Ok(n)
        }
    }

    #[test]
    fn counting_sink_tracks_bytes() {
        let mut out = Vec::new();
        let mut sink = CountingSink::new(&mut out);
        sink.put_tag(1, WireType::LengthDelimited).unwrap();
        sink.put_length_delimited(b"foo").unwrap();
        sink.put_fixed32(1).unwrap();
        assert_eq!(sink.written(), 9);
        assert_eq!(out, vec![0x0a, 0x03, b'f', b'o', b'o', 1, 0, 0, 0]);
    }

    #[test]
    fn short_write_is_reported() {
        let mut trickle = Trickle {
            limit: 2,
            out: Vec::new(),
        };
        let mut sink = CountingSink::new(&mut trickle);
        let err = sink.put(b"abcd").expect_err("写入端只接收 2 字节");
        assert!(matches!(
            err,
            WireError::ShortWrite {
                requested: 4,
                written: 2
            }
        ));
        assert_eq!(sink.written(), 2);
    }

    /// 每次只接收至多 3 字节的 `io::Write`。
    struct Pipe(Vec<u8>);

    impl std::io::Write for Pipe {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let n = buf.len().min(3);
            self.0.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn io_sink_retries_partial_writes() {
        let mut io = IoSink::new(Pipe(Vec::new()));
        let mut sink = CountingSink::new(&mut io);
        sink.put_length_delimited(b"partial").unwrap();
        assert_eq!(sink.written(), 8);
        assert_eq!(io.into_inner().0, b"\x07partial".to_vec());

        let mut buf = [0u8; 2];
        let mut closed = IoSink::new(&mut buf[..]);
        let err = closed.write(b"abc").expect_err("定长缓冲写满");
        assert_eq!(err.code(), crate::error::codes::SINK_IO);
    }

    #[test]
    fn io_and_bytes_sinks_accept_everything() {
        let mut io = IoSink::new(Vec::new());
        assert_eq!(io.write(b"xyz").unwrap(), 3);
        assert_eq!(io.into_inner(), b"xyz".to_vec());

        let mut buf = BytesMut::new();
        let mut sink = CountingSink::new(&mut buf);
        sink.put_fixed64(u64::MAX).unwrap();
        assert_eq!(&buf[..], &[0xff; 8]);
    }
}
