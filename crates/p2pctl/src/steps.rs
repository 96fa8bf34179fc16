//! Step grammar for `p2pctl run`.
//!
//! ```text
//! create | create-enabled | destroy | enable | disable | flush | link | unlink
//! write:<n> | read:<n>
//! wait:<event>              event name or host key 0-3
//! attr:<key>                attribute name or host key 0-6
//! fault:<call>:<status>     script the next status of a driver call
//! state
//! ```

use std::fmt;
use std::str::FromStr;

use p2pstream::{AttributeKey, DriverCall, StreamEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Create,
    CreateEnabled,
    Destroy,
    Enable,
    Disable,
    Flush,
    Link,
    Unlink,
    Write(u32),
    Read(u32),
    Wait(StreamEvent),
    Attr(AttributeKey),
    Fault(DriverCall, i32),
    State,
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let step = match s {
            "create" => Step::Create,
            "create-enabled" => Step::CreateEnabled,
            "destroy" => Step::Destroy,
            "enable" => Step::Enable,
            "disable" => Step::Disable,
            "flush" => Step::Flush,
            "link" => Step::Link,
            "unlink" => Step::Unlink,
            "state" => Step::State,
            _ => return parse_with_argument(s),
        };
        Ok(step)
    }
}

fn parse_with_argument(s: &str) -> Result<Step, String> {
    let Some((verb, arg)) = s.split_once(':') else {
        return Err(format!("unknown step '{}'", s));
    };

    match verb {
        "write" => Ok(Step::Write(count(arg)?)),
        "read" => Ok(Step::Read(count(arg)?)),
        "wait" => {
            let event = match arg.parse::<i32>() {
                Ok(key) => StreamEvent::try_from(key),
                Err(_) => arg.parse(),
            };
            event.map(Step::Wait).map_err(|e| e.to_string())
        }
        "attr" => {
            let key = match arg.parse::<i32>() {
                Ok(key) => AttributeKey::try_from(key),
                Err(_) => arg.parse(),
            };
            key.map(Step::Attr).map_err(|e| e.to_string())
        }
        "fault" => {
            let (call, status) = arg
                .rsplit_once(':')
                .ok_or_else(|| format!("expected fault:<call>:<status>, got '{}'", s))?;
            let call = call.parse::<DriverCall>().map_err(|e| e.to_string())?;
            let status = status
                .parse::<i32>()
                .map_err(|_| format!("status '{}' is not an integer", status))?;
            Ok(Step::Fault(call, status))
        }
        _ => Err(format!("unknown step '{}'", s)),
    }
}

fn count(arg: &str) -> Result<u32, String> {
    arg.parse()
        .map_err(|_| format!("'{}' is not an element count", arg))
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Create => write!(f, "create"),
            Step::CreateEnabled => write!(f, "create-enabled"),
            Step::Destroy => write!(f, "destroy"),
            Step::Enable => write!(f, "enable"),
            Step::Disable => write!(f, "disable"),
            Step::Flush => write!(f, "flush"),
            Step::Link => write!(f, "link"),
            Step::Unlink => write!(f, "unlink"),
            Step::Write(n) => write!(f, "write:{}", n),
            Step::Read(n) => write!(f, "read:{}", n),
            Step::Wait(event) => write!(f, "wait:{}", event),
            Step::Attr(key) => write!(f, "attr:{}", key),
            Step::Fault(call, status) => write!(f, "fault:{}:{}", call.name(), status),
            Step::State => write!(f, "state"),
        }
    }
}
