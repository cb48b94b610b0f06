use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// Architectures which apt prints alongside package names in `Get:` lines.
const ARCHITECTURES: &[&str] = &["all", "amd64", "arm64", "armhf", "i386"];

/// Progress reported by apt-get while packages are fetched or installed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AptEvent {
    Fetched { package: String, version: String },
    Processing { package: String },
    Progress { percent: u8 },
    SettingUp { package: String },
    Unpacking { package: String, version: String, over: String },
}

impl Display for AptEvent {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        match self {
            AptEvent::Fetched { package, version } => write!(fmt, "fetched {} ({})", package, version),
            AptEvent::Processing { package } => write!(fmt, "processing triggers for {}", package),
            AptEvent::Progress { percent } => write!(fmt, "progress: [{:03}%]", percent),
            AptEvent::SettingUp { package } => write!(fmt, "setting up {}", package),
            AptEvent::Unpacking { package, version, over } => {
                write!(fmt, "unpacking {} ({}) over ({})", package, version, over)
            }
        }
    }
}

impl FromStr for AptEvent {
    type Err = ();

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.starts_with("Get:") {
            return parse_get(input).ok_or(());
        } else if let Some(progress) = input.strip_prefix("Progress: [") {
            if let Some(percent) = progress.strip_suffix("%]") {
                if let Ok(percent) = percent.trim_start().parse::<u8>() {
                    return Ok(AptEvent::Progress { percent });
                }
            }
        } else if let Some(input) = input.strip_prefix("Processing triggers for ") {
            if let Some(package) = input.split_whitespace().next() {
                return Ok(AptEvent::Processing { package: strip_arch(package).to_owned() });
            }
        } else if let Some(input) = input.strip_prefix("Setting up ") {
            if let Some(package) = input.split_whitespace().next() {
                return Ok(AptEvent::SettingUp { package: strip_arch(package).to_owned() });
            }
        } else if let Some(input) = input.strip_prefix("Unpacking ") {
            let mut fields = input.split_whitespace();
            if let (Some(package), Some(version), Some(over)) =
                (fields.next(), fields.next(), fields.nth(1))
            {
                if let (Some(version), Some(over)) = (parenthesized(version), parenthesized(over)) {
                    return Ok(AptEvent::Unpacking {
                        package: strip_arch(package).to_owned(),
                        version: version.to_owned(),
                        over: over.to_owned(),
                    });
                }
            }
        }

        Err(())
    }
}

/// `Get:3 http://host/ubuntu focal/main amd64 libfoo amd64 1.2-1 [45.6 kB]`
fn parse_get(input: &str) -> Option<AptEvent> {
    let fields = input.split_whitespace().collect::<Vec<_>>();
    let size = fields.iter().position(|field| field.starts_with('['))?;

    if size < 3 {
        return None;
    }

    let version = fields[size - 1];
    let mut package = fields[size - 2];

    if ARCHITECTURES.contains(&package) {
        package = fields.get(size.checked_sub(3)?).copied()?;
    }

    Some(AptEvent::Fetched { package: package.to_owned(), version: version.to_owned() })
}

/// `(1.2-1)` -> `1.2-1`
fn parenthesized(field: &str) -> Option<&str> {
    field.strip_prefix('(')?.strip_suffix(')').filter(|inner| !inner.is_empty())
}

/// `libfoo:amd64` -> `libfoo`
pub fn strip_arch(package: &str) -> &str { package.split(':').next().unwrap_or(package) }

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Progress: [  1%]" => Ok(AptEvent::Progress { percent: 1 }) ; "single digit")]
    #[test_case("Progress: [ 25%]" => Ok(AptEvent::Progress { percent: 25 }) ; "double digit")]
    #[test_case("Progress: [100%]" => Ok(AptEvent::Progress { percent: 100 }) ; "complete")]
    #[test_case(
        "Setting up ion-dbreports (5.0.4) ..."
        => Ok(AptEvent::SettingUp { package: "ion-dbreports".into() })
        ; "setting up"
    )]
    #[test_case(
        "Setting up libssl1.1:amd64 (1.1.1f-1ubuntu2) ..."
        => Ok(AptEvent::SettingUp { package: "libssl1.1".into() })
        ; "setting up strips the architecture"
    )]
    #[test_case(
        "Processing triggers for man-db (2.9.1-1) ..."
        => Ok(AptEvent::Processing { package: "man-db".into() })
        ; "processing triggers"
    )]
    #[test_case(
        "Unpacking ion-analysis (5.0.6) over (5.0.4) ..."
        => Ok(AptEvent::Unpacking {
            package: "ion-analysis".into(),
            version: "5.0.6".into(),
            over: "5.0.4".into(),
        })
        ; "unpacking"
    )]
    #[test_case(
        "Get:1 http://archive.ubuntu.com/ubuntu focal-updates/main amd64 libssl1.1 amd64 1.1.1f-1ubuntu2.16 [1,321 kB]"
        => Ok(AptEvent::Fetched { package: "libssl1.1".into(), version: "1.1.1f-1ubuntu2.16".into() })
        ; "get with architecture"
    )]
    #[test_case(
        "Get:2 http://updates.example.com/ion ./ ion-tsconfig 5.0.6 [94.1 kB]"
        => Ok(AptEvent::Fetched { package: "ion-tsconfig".into(), version: "5.0.6".into() })
        ; "get from a flat repository"
    )]
    #[test_case("Reading package lists..." => Err(()) ; "unrelated output")]
    #[test_case("Get:1 http://host" => Err(()) ; "truncated get")]
    #[test_case("Unpacking x 1é over 0é" => Err(()) ; "unpacking without parentheses")]
    #[test_case("Unpacking x () over (1.0)" => Err(()) ; "unpacking with an empty version")]
    fn parse(input: &str) -> Result<AptEvent, ()> { input.parse::<AptEvent>() }
}
