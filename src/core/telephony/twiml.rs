//! TwiML generation.
//!
//! All text and attribute content is XML-escaped.

/// A TwiML verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TwimlVerb {
    /// Speak text using text-to-speech.
    Say { text: String },
    /// Pause for a number of seconds.
    Pause { length: u32 },
    /// Connect the call to a bidirectional media stream.
    Connect { stream_url: String },
    /// Transfer the call to a phone number.
    Dial { number: String },
}

/// Render a sequence of verbs into a TwiML document.
pub fn render_twiml(verbs: &[TwimlVerb]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n");

    for verb in verbs {
        match verb {
            TwimlVerb::Say { text } => {
                xml.push_str(&format!("  <Say>{}</Say>\n", xml_escape(text)));
            }
            TwimlVerb::Pause { length } => {
                xml.push_str(&format!("  <Pause length=\"{}\"/>\n", length));
            }
            TwimlVerb::Connect { stream_url } => {
                xml.push_str("  <Connect>\n");
                xml.push_str(&format!(
                    "    <Stream url=\"{}\"/>\n",
                    xml_escape(stream_url)
                ));
                xml.push_str("  </Connect>\n");
            }
            TwimlVerb::Dial { number } => {
                xml.push_str(&format!("  <Dial>{}</Dial>\n", xml_escape(number)));
            }
        }
    }

    xml.push_str("</Response>");
    xml
}

/// Greeting, a one second pause, the prompt, then the media stream.
pub fn incoming_call_twiml(greeting: &str, prompt: &str, stream_url: &str) -> String {
    render_twiml(&[
        TwimlVerb::Say {
            text: greeting.to_string(),
        },
        TwimlVerb::Pause { length: 1 },
        TwimlVerb::Say {
            text: prompt.to_string(),
        },
        TwimlVerb::Connect {
            stream_url: stream_url.to_string(),
        },
    ])
}

/// Compact transfer document, suitable for a call update request.
pub fn dial_twiml(number: &str) -> String {
    format!("<Response><Dial>{}</Dial></Response>", xml_escape(number))
}

fn xml_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            _ => result.push(ch),
        }
    }
    result
}
