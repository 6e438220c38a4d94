//! Minimal XML-RPC value codec.
//!
//! Requests are written as plain strings; responses are read with
//! `quick-xml` events. Only what MetaWeblog hosts send back is supported:
//! scalars, arrays, structs and faults.

use std::collections::BTreeMap;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::remote::RemoteError;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Double(f64),
    String(String),
    /// `dateTime.iso8601`, kept verbatim.
    DateTime(String),
    /// Base64 payload, kept verbatim.
    Base64(String),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
    Nil,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::DateTime(s) | Value::Base64(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Struct member lookup; `None` for non-structs.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.get(key),
            _ => None,
        }
    }

    /// Render a string or integer member as text (post ids come as either).
    pub fn text(&self) -> Option<String> {
        match self {
            Value::Int(i) => Some(i.to_string()),
            other => other.as_str().map(str::to_string),
        }
    }

    fn write_xml(&self, out: &mut String) {
        out.push_str("<value>");
        match self {
            Value::Int(i) => out.push_str(&format!("<int>{i}</int>")),
            Value::Bool(b) => out.push_str(&format!("<boolean>{}</boolean>", u8::from(*b))),
            Value::Double(d) => out.push_str(&format!("<double>{d}</double>")),
            Value::String(s) => {
                out.push_str("<string>");
                out.push_str(&escape(s));
                out.push_str("</string>");
            }
            Value::DateTime(s) => {
                out.push_str("<dateTime.iso8601>");
                out.push_str(&escape(s));
                out.push_str("</dateTime.iso8601>");
            }
            Value::Base64(s) => {
                out.push_str("<base64>");
                out.push_str(&escape(s));
                out.push_str("</base64>");
            }
            Value::Array(items) => {
                out.push_str("<array><data>");
                for item in items {
                    item.write_xml(out);
                }
                out.push_str("</data></array>");
            }
            Value::Struct(members) => {
                out.push_str("<struct>");
                for (name, value) in members {
                    out.push_str("<member><name>");
                    out.push_str(&escape(name));
                    out.push_str("</name>");
                    value.write_xml(out);
                    out.push_str("</member>");
                }
                out.push_str("</struct>");
            }
            Value::Nil => out.push_str("<nil/>"),
        }
        out.push_str("</value>");
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

/// Decoded `methodResponse`.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    Success(Value),
    Fault { code: i64, message: String },
}

/// Serialize a `methodCall` document.
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        param.write_xml(&mut out);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

/// Parse a `methodResponse` document.
pub fn parse_response(xml: &str) -> Result<MethodResponse, RemoteError> {
    let mut parser = Parser {
        reader: Reader::from_str(xml),
    };
    parser.expect_start(b"methodResponse")?;
    match parser.next()? {
        Event::Start(e) if e.name().as_ref() == b"params" => {
            parser.expect_start(b"param")?;
            parser.expect_start(b"value")?;
            let value = parser.value()?;
            Ok(MethodResponse::Success(value))
        }
        Event::Start(e) if e.name().as_ref() == b"fault" => {
            parser.expect_start(b"value")?;
            let fault = parser.value()?;
            let code = fault.get("faultCode").and_then(Value::as_i64).unwrap_or(-1);
            let message = fault
                .get("faultString")
                .and_then(Value::text)
                .unwrap_or_default();
            Ok(MethodResponse::Fault { code, message })
        }
        other => Err(unexpected("<params> or <fault>", &other)),
    }
}

// ---------------------------------------------------------------------------
// Event-level parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> Parser<'a> {
    /// Next event, skipping declarations, comments and processing instructions.
    fn next_raw(&mut self) -> Result<Event<'a>, RemoteError> {
        loop {
            let event = self
                .reader
                .read_event()
                .map_err(|e| RemoteError::Protocol(format!("malformed XML: {e}")))?;
            match event {
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => continue,
                Event::Eof => {
                    return Err(RemoteError::Protocol("unexpected end of response".into()))
                }
                other => return Ok(other),
            }
        }
    }

    /// Like [`Self::next_raw`] but also skips whitespace between elements.
    fn next(&mut self) -> Result<Event<'a>, RemoteError> {
        loop {
            match self.next_raw()? {
                Event::Text(t) if t.iter().all(u8::is_ascii_whitespace) => continue,
                other => return Ok(other),
            }
        }
    }

    fn expect_start(&mut self, name: &[u8]) -> Result<(), RemoteError> {
        match self.next()? {
            Event::Start(e) if e.name().as_ref() == name => Ok(()),
            other => Err(unexpected(&tag(name), &other)),
        }
    }

    fn expect_end(&mut self, name: &[u8]) -> Result<(), RemoteError> {
        match self.next()? {
            Event::End(e) if e.name().as_ref() == name => Ok(()),
            other => Err(unexpected(&format!("</{}>", String::from_utf8_lossy(name)), &other)),
        }
    }

    /// Character data up to the closing `name` tag.
    fn text_until(&mut self, name: &[u8]) -> Result<String, RemoteError> {
        let mut text = String::new();
        loop {
            match self.next_raw()? {
                Event::Text(t) => text.push_str(
                    &t.unescape()
                        .map_err(|e| RemoteError::Protocol(format!("bad escape: {e}")))?,
                ),
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
                Event::End(e) if e.name().as_ref() == name => return Ok(text),
                other => return Err(unexpected("character data", &other)),
            }
        }
    }

    /// Parse the contents of a `<value>` whose start tag was just consumed,
    /// through its closing tag. Untyped content is a string.
    fn value(&mut self) -> Result<Value, RemoteError> {
        let mut text = String::new();
        loop {
            match self.next_raw()? {
                Event::Text(t) => text.push_str(
                    &t.unescape()
                        .map_err(|e| RemoteError::Protocol(format!("bad escape: {e}")))?,
                ),
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
                Event::End(e) if e.name().as_ref() == b"value" => return Ok(Value::String(text)),
                Event::Start(e) => {
                    if !text.trim().is_empty() {
                        return Err(RemoteError::Protocol("mixed content in <value>".into()));
                    }
                    let name = e.name().as_ref().to_vec();
                    let value = self.typed(&name)?;
                    self.expect_end(b"value")?;
                    return Ok(value);
                }
                Event::Empty(e) => {
                    let value = match e.name().as_ref() {
                        b"nil" => Value::Nil,
                        b"string" => Value::String(String::new()),
                        b"array" => Value::Array(Vec::new()),
                        b"struct" => Value::Struct(BTreeMap::new()),
                        other => {
                            return Err(RemoteError::Protocol(format!(
                                "unsupported empty element <{}/>",
                                String::from_utf8_lossy(other)
                            )))
                        }
                    };
                    self.expect_end(b"value")?;
                    return Ok(value);
                }
                other => return Err(unexpected("a value", &other)),
            }
        }
    }

    fn typed(&mut self, name: &[u8]) -> Result<Value, RemoteError> {
        match name {
            b"int" | b"i4" | b"i8" => {
                let raw = self.text_until(name)?;
                raw.trim()
                    .parse()
                    .map(Value::Int)
                    .map_err(|_| RemoteError::Protocol(format!("bad integer {raw:?}")))
            }
            b"boolean" => match self.text_until(name)?.trim() {
                "1" => Ok(Value::Bool(true)),
                "0" => Ok(Value::Bool(false)),
                raw => Err(RemoteError::Protocol(format!("bad boolean {raw:?}"))),
            },
            b"double" => {
                let raw = self.text_until(name)?;
                raw.trim()
                    .parse()
                    .map(Value::Double)
                    .map_err(|_| RemoteError::Protocol(format!("bad double {raw:?}")))
            }
            b"string" => self.text_until(name).map(Value::String),
            b"dateTime.iso8601" => self.text_until(name).map(|s| Value::DateTime(s.trim().to_string())),
            b"base64" => self.text_until(name).map(|s| Value::Base64(s.trim().to_string())),
            b"nil" => {
                self.expect_end(b"nil")?;
                Ok(Value::Nil)
            }
            b"array" => self.array(),
            b"struct" => self.structure(),
            other => Err(RemoteError::Protocol(format!(
                "unsupported value type <{}>",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    fn array(&mut self) -> Result<Value, RemoteError> {
        let mut items = Vec::new();
        match self.next()? {
            Event::Start(e) if e.name().as_ref() == b"data" => loop {
                match self.next()? {
                    Event::Start(e) if e.name().as_ref() == b"value" => items.push(self.value()?),
                    Event::End(e) if e.name().as_ref() == b"data" => break,
                    other => return Err(unexpected("<value> or </data>", &other)),
                }
            },
            Event::Empty(e) if e.name().as_ref() == b"data" => {}
            other => return Err(unexpected("<data>", &other)),
        }
        self.expect_end(b"array")?;
        Ok(Value::Array(items))
    }

    fn structure(&mut self) -> Result<Value, RemoteError> {
        let mut members = BTreeMap::new();
        loop {
            match self.next()? {
                Event::Start(e) if e.name().as_ref() == b"member" => {
                    self.expect_start(b"name")?;
                    let name = self.text_until(b"name")?;
                    self.expect_start(b"value")?;
                    let value = self.value()?;
                    self.expect_end(b"member")?;
                    members.insert(name, value);
                }
                Event::End(e) if e.name().as_ref() == b"struct" => break,
                other => return Err(unexpected("<member> or </struct>", &other)),
            }
        }
        Ok(Value::Struct(members))
    }
}

fn tag(name: &[u8]) -> String {
    format!("<{}>", String::from_utf8_lossy(name))
}

fn unexpected(wanted: &str, got: &Event<'_>) -> RemoteError {
    let got = match got {
        Event::Start(e) => tag(e.name().as_ref()),
        Event::End(e) => format!("</{}>", String::from_utf8_lossy(e.name().as_ref())),
        Event::Empty(e) => format!("<{}/>", String::from_utf8_lossy(e.name().as_ref())),
        Event::Text(_) | Event::CData(_) => "text".to_string(),
        _ => "other markup".to_string(),
    };
    RemoteError::Protocol(format!("expected {wanted}, found {got}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
