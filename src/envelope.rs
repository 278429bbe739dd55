use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Number, Value};

use crate::error::FreeCadError;

const XML_PROLOG: &str = "<?xml version=\"1.0\"?>\n";

pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(128);
    out.push_str(XML_PROLOG);
    out.push_str("<methodCall>\n<methodName>");
    push_escaped(&mut out, method);
    out.push_str("</methodName>\n<params>\n");
    for param in params {
        out.push_str("<param>\n");
        encode_value(&mut out, param);
        out.push_str("</param>\n");
    }
    out.push_str("</params>\n</methodCall>\n");
    out
}

pub fn encode_response(value: &Value) -> String {
    let mut out = String::with_capacity(128);
    out.push_str(XML_PROLOG);
    out.push_str("<methodResponse>\n<params>\n<param>\n");
    encode_value(&mut out, value);
    out.push_str("</param>\n</params>\n</methodResponse>\n");
    out
}

pub fn encode_fault(code: i64, message: &str) -> String {
    let mut fault = Map::new();
    fault.insert("faultCode".to_string(), Value::from(code));
    fault.insert("faultString".to_string(), Value::from(message));

    let mut out = String::with_capacity(128);
    out.push_str(XML_PROLOG);
    out.push_str("<methodResponse>\n<fault>\n");
    encode_value(&mut out, &Value::Object(fault));
    out.push_str("</fault>\n</methodResponse>\n");
    out
}

pub fn decode_response(body: &str) -> Result<Value, FreeCadError> {
    let mut reader = XmlReader::new(body);
    reader.expect_open("methodResponse")?;

    match reader.next_tag()? {
        XmlEvent::Open(name) if name == "params" => {
            reader.expect_open("param")?;
            let value = reader.parse_value_element()?;
            reader.expect_close("param")?;
            reader.expect_close("params")?;
            reader.expect_close("methodResponse")?;
            Ok(value)
        }
        XmlEvent::Open(name) if name == "fault" => {
            let value = reader.parse_value_element()?;
            reader.expect_close("fault")?;
            Err(fault_from_value(&value))
        }
        other => Err(unexpected(&other, "<params> or <fault>")),
    }
}

pub fn decode_call(body: &str) -> Result<(String, Vec<Value>), FreeCadError> {
    let mut reader = XmlReader::new(body);
    reader.expect_open("methodCall")?;
    reader.expect_open("methodName")?;
    let method = reader.read_text("methodName")?.trim().to_string();

    let mut params = Vec::new();
    match reader.next_tag()? {
        XmlEvent::Open(name) if name == "params" => loop {
            match reader.next_tag()? {
                XmlEvent::Close(name) if name == "params" => break,
                XmlEvent::Open(name) if name == "param" => {
                    params.push(reader.parse_value_element()?);
                    reader.expect_close("param")?;
                }
                other => return Err(unexpected(&other, "<param> or </params>")),
            }
        },
        XmlEvent::Empty(name) if name == "params" => {}
        XmlEvent::Close(name) if name == "methodCall" => return Ok((method, params)),
        other => return Err(unexpected(&other, "<params>")),
    }

    reader.expect_close("methodCall")?;
    Ok((method, params))
}

fn encode_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Null => out.push_str("<nil/>"),
        Value::Bool(flag) => {
            out.push_str("<boolean>");
            out.push(if *flag { '1' } else { '0' });
            out.push_str("</boolean>");
        }
        Value::Number(number) => encode_number(out, number),
        Value::String(text) => {
            out.push_str("<string>");
            push_escaped(out, text);
            out.push_str("</string>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>\n");
            for item in items {
                encode_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Object(members) => {
            out.push_str("<struct>\n");
            for (name, member) in members {
                out.push_str("<member><name>");
                push_escaped(out, name);
                out.push_str("</name>");
                encode_value(out, member);
                out.push_str("</member>\n");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>\n");
}

fn encode_number(out: &mut String, number: &Number) {
    if let Some(int) = number.as_i64() {
        let tag = if i32::try_from(int).is_ok() { "int" } else { "i8" };
        out.push_str(&format!("<{tag}>{int}</{tag}>"));
        return;
    }

    let double = number.as_f64().unwrap_or(0.0);
    out.push_str(&format!("<double>{double:?}</double>"));
}

fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}


fn fault_from_value(value: &Value) -> FreeCadError {
    let code = value.get("faultCode").and_then(Value::as_i64).unwrap_or(0);
    let message = value
        .get("faultString")
        .and_then(Value::as_str)
        .unwrap_or("unknown fault")
        .to_string();

    FreeCadError::Fault { code, message }
}

fn decode_error(reason: impl Into<String>) -> FreeCadError {
    FreeCadError::XmlRpcDecode(reason.into())
}

fn unexpected(event: &XmlEvent, expected: &str) -> FreeCadError {
    decode_error(format!("expected {expected}, found {event:?}"))
}

/// Element and character events with local names; namespaces, attributes,
/// prologs, comments and processing instructions are already dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
enum XmlEvent {
    Open(String),
    Close(String),
    Empty(String),
    /// Unescaped character data, or the raw content of a CDATA section.
    Text(String),
    Eof,
}

struct XmlReader<'a> {
    reader: Reader<&'a [u8]>,
    peeked: Option<XmlEvent>,
}

impl<'a> XmlReader<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            reader: Reader::from_str(input),
            peeked: None,
        }
    }

    fn next_event(&mut self) -> Result<XmlEvent, FreeCadError> {
        if let Some(event) = self.peeked.take() {
            return Ok(event);
        }

        loop {
            let event = self.reader.read_event().map_err(|err| {
                decode_error(format!(
                    "malformed XML at byte {}: {err}",
                    self.reader.buffer_position()
                ))
            })?;

            return match event {
                Event::Start(start) => Ok(XmlEvent::Open(element_name(start.local_name().as_ref())?)),
                Event::Empty(start) => Ok(XmlEvent::Empty(element_name(start.local_name().as_ref())?)),
                Event::End(end) => Ok(XmlEvent::Close(element_name(end.local_name().as_ref())?)),
                Event::Text(text) => text
                    .unescape()
                    .map(|text| XmlEvent::Text(text.into_owned()))
                    .map_err(|err| decode_error(format!("invalid character data: {err}"))),
                Event::CData(cdata) => String::from_utf8(cdata.into_inner().into_owned())
                    .map(XmlEvent::Text)
                    .map_err(|err| decode_error(format!("invalid CDATA section: {err}"))),
                Event::Eof => Ok(XmlEvent::Eof),
                _ => continue,
            };
        }
    }

    /// Next markup event, skipping whitespace-only character data.
    fn next_tag(&mut self) -> Result<XmlEvent, FreeCadError> {
        loop {
            match self.next_event()? {
                XmlEvent::Text(text) if text.trim().is_empty() => continue,
                XmlEvent::Eof => return Err(decode_error("unexpected end of document")),
                event => return Ok(event),
            }
        }
    }

    fn expect_open(&mut self, tag: &str) -> Result<(), FreeCadError> {
        match self.next_tag()? {
            XmlEvent::Open(name) if name == tag => Ok(()),
            other => Err(unexpected(&other, &format!("<{tag}>"))),
        }
    }

    fn expect_close(&mut self, tag: &str) -> Result<(), FreeCadError> {
        match self.next_tag()? {
            XmlEvent::Close(name) if name == tag => Ok(()),
            other => Err(unexpected(&other, &format!("</{tag}>"))),
        }
    }

    fn read_text(&mut self, tag: &str) -> Result<String, FreeCadError> {
        let mut text = String::new();
        loop {
            match self.next_event()? {
                XmlEvent::Text(chunk) => text.push_str(&chunk),
                XmlEvent::Close(name) if name == tag => return Ok(text),
                XmlEvent::Eof => return Err(decode_error(format!("unterminated <{tag}>"))),
                other => return Err(unexpected(&other, &format!("text or </{tag}>"))),
            }
        }
    }

    fn parse_value_element(&mut self) -> Result<Value, FreeCadError> {
        match self.next_tag()? {
            XmlEvent::Open(name) if name == "value" => self.parse_value(),
            XmlEvent::Empty(name) if name == "value" => Ok(Value::String(String::new())),
            other => Err(unexpected(&other, "<value>")),
        }
    }

    /// Parses the body of a `<value>` whose opening tag was already consumed.
    /// Untyped content is a string.
    fn parse_value(&mut self) -> Result<Value, FreeCadError> {
        let mut text = String::new();
        loop {
            match self.next_event()? {
                XmlEvent::Text(chunk) => text.push_str(&chunk),
                XmlEvent::Close(name) if name == "value" => return Ok(Value::String(text)),
                event @ (XmlEvent::Open(_) | XmlEvent::Empty(_)) if text.trim().is_empty() => {
                    self.peeked = Some(event);
                    let value = self.parse_typed()?;
                    self.expect_close("value")?;
                    return Ok(value);
                }
                XmlEvent::Eof => return Err(decode_error("unterminated <value>")),
                other => return Err(unexpected(&other, "</value>")),
            }
        }
    }

    fn parse_typed(&mut self) -> Result<Value, FreeCadError> {
        let tag = match self.next_tag()? {
            XmlEvent::Empty(tag) => return empty_typed(&tag),
            XmlEvent::Open(tag) => tag,
            other => return Err(unexpected(&other, "a typed value")),
        };

        match tag.as_str() {
            "int" | "i4" | "i8" => {
                let text = self.read_text(&tag)?;
                let int = text
                    .trim()
                    .parse::<i64>()
                    .map_err(|err| decode_error(format!("invalid <{tag}> `{text}`: {err}")))?;
                Ok(Value::from(int))
            }
            "boolean" => {
                let text = self.read_text(&tag)?;
                match text.trim() {
                    "1" => Ok(Value::Bool(true)),
                    "0" => Ok(Value::Bool(false)),
                    other => Err(decode_error(format!("invalid <boolean> `{other}`"))),
                }
            }
            "double" => {
                let text = self.read_text(&tag)?;
                let double = text
                    .trim()
                    .parse::<f64>()
                    .map_err(|err| decode_error(format!("invalid <double> `{text}`: {err}")))?;
                Ok(Number::from_f64(double)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(text.trim().to_string())))
            }
            "string" | "base64" | "dateTime.iso8601" => Ok(Value::String(self.read_text(&tag)?)),
            "nil" => {
                self.expect_close("nil")?;
                Ok(Value::Null)
            }
            "struct" => self.parse_struct(),
            "array" => self.parse_array(),
            other => Err(decode_error(format!("unsupported value type <{other}>"))),
        }
    }

    fn parse_struct(&mut self) -> Result<Value, FreeCadError> {
        let mut members = Map::new();
        loop {
            match self.next_tag()? {
                XmlEvent::Close(name) if name == "struct" => return Ok(Value::Object(members)),
                XmlEvent::Open(name) if name == "member" => {
                    self.expect_open("name")?;
                    let name = self.read_text("name")?;
                    let value = self.parse_value_element()?;
                    self.expect_close("member")?;
                    members.insert(name, value);
                }
                other => return Err(unexpected(&other, "<member> or </struct>")),
            }
        }
    }

    fn parse_array(&mut self) -> Result<Value, FreeCadError> {
        match self.next_tag()? {
            XmlEvent::Empty(name) if name == "data" => {
                self.expect_close("array")?;
                return Ok(Value::Array(Vec::new()));
            }
            XmlEvent::Open(name) if name == "data" => {}
            other => return Err(unexpected(&other, "<data>")),
        }

        let mut items = Vec::new();
        loop {
            match self.next_tag()? {
                XmlEvent::Close(name) if name == "data" => break,
                XmlEvent::Open(name) if name == "value" => items.push(self.parse_value()?),
                XmlEvent::Empty(name) if name == "value" => items.push(Value::String(String::new())),
                other => return Err(unexpected(&other, "<value> or </data>")),
            }
        }

        self.expect_close("array")?;
        Ok(Value::Array(items))
    }
}

fn element_name(raw: &[u8]) -> Result<String, FreeCadError> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|err| decode_error(format!("invalid element name: {err}")))
}

fn empty_typed(tag: &str) -> Result<Value, FreeCadError> {
    match tag {
        "nil" => Ok(Value::Null),
        "string" | "base64" | "dateTime.iso8601" => Ok(Value::String(String::new())),
        "struct" => Ok(Value::Object(Map::new())),
        "array" => Ok(Value::Array(Vec::new())),
        other => Err(decode_error(format!("empty <{other}/> carries no value"))),
    }
}
