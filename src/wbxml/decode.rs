//! WBXML decoder
//!
//! Parses a server response token stream into a [`Node`] tree. Every
//! malformed input (truncated buffer, unknown control token, unsupported
//! code page) maps to [`Error::ProtocolDecode`] — fatal for this
//! response only, never retried blindly.

use super::Node;
use super::encode::{END, OPAQUE, STR_I, SWITCH_PAGE, WITH_CONTENT};
use super::pages;
use crate::error::{Error, Result};

/// Decode a WBXML document into its root element.
pub fn decode(bytes: &[u8]) -> Result<Node> {
    let mut parser = Parser {
        data: bytes,
        pos: 0,
        page: 0,
    };
    parser.header()?;

    // Page switches may precede the root element.
    while parser.peek()? == SWITCH_PAGE {
        parser.switch_page()?;
    }
    let root = parser.element()?;
    Ok(root)
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
    page: u8,
}

impl Parser<'_> {
    fn header(&mut self) -> Result<()> {
        let version = self.byte()?;
        if version > 0x03 {
            return Err(Error::ProtocolDecode(format!(
                "unsupported wbxml version 0x{version:02x}"
            )));
        }
        let _public_id = self.mb_u32()?;
        let charset = self.mb_u32()?;
        // 0x6A = UTF-8, 0x04 = ISO-8859-1; anything else we cannot
        // interpret inline strings under.
        if charset != 0x6A && charset != 0x04 {
            return Err(Error::ProtocolDecode(format!(
                "unsupported charset 0x{charset:02x}"
            )));
        }
        let table_len = self.mb_usize()?;
        self.take(table_len)?;
        Ok(())
    }

    fn element(&mut self) -> Result<Node> {
        let tag = self.byte()?;
        if tag & 0x80 != 0 {
            // ActiveSync never uses attribute lists.
            return Err(Error::ProtocolDecode(format!(
                "unexpected attribute flag on tag 0x{tag:02x}"
            )));
        }
        let token = tag & 0x3F;
        if token < 0x05 {
            return Err(Error::ProtocolDecode(format!(
                "unexpected control token 0x{tag:02x} in element position"
            )));
        }

        let mut node = Node::new(self.page, token);
        if tag & WITH_CONTENT == 0 {
            return Ok(node);
        }

        loop {
            match self.peek()? {
                END => {
                    self.pos += 1;
                    return Ok(node);
                }
                SWITCH_PAGE => self.switch_page()?,
                STR_I => {
                    self.pos += 1;
                    let text = self.cstring()?;
                    match &mut node.text {
                        Some(existing) => existing.push_str(&text),
                        None => node.text = Some(text),
                    }
                }
                OPAQUE => {
                    self.pos += 1;
                    let len = self.mb_usize()?;
                    let data = self.take(len)?.to_vec();
                    node.opaque = Some(data);
                }
                b if b & 0x3F >= 0x05 => node.children.push(self.element()?),
                b => {
                    return Err(Error::ProtocolDecode(format!(
                        "unknown control token 0x{b:02x} at offset {}",
                        self.pos
                    )));
                }
            }
        }
    }

    fn switch_page(&mut self) -> Result<()> {
        self.pos += 1;
        let page = self.byte()?;
        if !pages::is_supported_page(page) {
            return Err(Error::ProtocolDecode(format!(
                "unknown code page 0x{page:02x}"
            )));
        }
        self.page = page;
        Ok(())
    }

    fn peek(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| Error::ProtocolDecode("truncated wbxml stream".into()))
    }

    fn byte(&mut self) -> Result<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&e| e <= self.data.len())
            .ok_or_else(|| Error::ProtocolDecode("truncated opaque payload".into()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn cstring(&mut self) -> Result<String> {
        let start = self.pos;
        while self.byte()? != 0 {}
        Ok(String::from_utf8_lossy(&self.data[start..self.pos - 1]).into_owned())
    }

    fn mb_u32(&mut self) -> Result<u32> {
        let mut value: u32 = 0;
        for _ in 0..5 {
            let b = self.byte()?;
            value = (value << 7) | u32::from(b & 0x7F);
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::ProtocolDecode("oversized multi-byte integer".into()))
    }

    fn mb_usize(&mut self) -> Result<usize> {
        self.mb_u32().map(|v| {
            usize::try_from(v).unwrap_or(usize::MAX)
        })
    }
}
