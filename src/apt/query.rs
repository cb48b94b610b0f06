//! Parsers for the output of `apt-cache` and `apt-get --print-uris`.

use super::PackageInfo;

/// Parses the `Installed:` and `Candidate:` fields of `apt-cache policy <package>`.
///
/// Returns `None` if apt does not know of the package at all.
pub fn parse_policy(package: &str, output: &str) -> Option<PackageInfo> {
    let mut installed = None;
    let mut candidate = None;
    let mut found = false;

    for line in output.lines() {
        let line = line.trim();
        if let Some(version) = line.strip_prefix("Installed:") {
            found = true;
            installed = version_field(version);
        } else if let Some(version) = line.strip_prefix("Candidate:") {
            found = true;
            candidate = version_field(version);
        }
    }

    if found {
        Some(PackageInfo { name: package.to_owned(), installed, candidate })
    } else {
        None
    }
}

fn version_field(value: &str) -> Option<String> {
    match value.trim() {
        "" | "(none)" => None,
        version => Some(version.to_owned()),
    }
}

/// Names of the packages listed under `Reverse Provides:` in `apt-cache showpkg <package>`.
pub fn parse_reverse_provides(output: &str) -> Vec<String> {
    let mut providers: Vec<String> = Vec::new();

    let section = output
        .lines()
        .skip_while(|line| !line.starts_with("Reverse Provides:"))
        .skip(1)
        .take_while(|line| !line.trim().is_empty() && !line.contains(": "));

    for line in section {
        if let Some(name) = line.split_whitespace().next() {
            if !providers.iter().any(|p| p == name) {
                providers.push(name.to_owned());
            }
        }
    }

    providers
}

/// Sums the size column of `apt-get --print-uris -qq` output.
///
/// Each line has the form `'uri' filename size checksum`.
pub fn parse_download_size(output: &str) -> u64 {
    output
        .lines()
        .filter(|line| line.starts_with('\''))
        .filter_map(|line| line.split_whitespace().nth(2))
        .filter_map(|size| size.parse::<u64>().ok())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPGRADABLE: &str = "ion-tsconfig:
  Installed: 5.0.4
  Candidate: 5.0.6
  Version table:
     5.0.6 500
        500 http://updates.example.com/ion ./ Packages
 *** 5.0.4 100
        100 /var/lib/dpkg/status
";

    const NOT_INSTALLED: &str = "ion-plugins:
  Installed: (none)
  Candidate: 5.0.6
  Version table:
     5.0.6 500
";

    const VIRTUAL: &str = "mail-transport-agent:
  Installed: (none)
  Candidate: (none)
  Version table:
";

    const SHOWPKG: &str = "Package: mail-transport-agent
Versions:

Reverse Depends:
  bsd-mailx,mail-transport-agent
Dependencies:
Provides:
Reverse Provides:
postfix 3.4.13-0ubuntu1
exim4-daemon-light 4.93-13ubuntu1
postfix 3.4.13-0ubuntu1.2
";

    #[test]
    fn policy_upgradable() {
        let info = parse_policy("ion-tsconfig", UPGRADABLE).unwrap();
        assert_eq!(info.installed.as_deref(), Some("5.0.4"));
        assert_eq!(info.candidate.as_deref(), Some("5.0.6"));
        assert!(info.is_installed());
        assert!(info.is_upgradable());
    }

    #[test]
    fn policy_not_installed() {
        let info = parse_policy("ion-plugins", NOT_INSTALLED).unwrap();
        assert!(!info.is_installed());
        assert!(!info.is_upgradable());
        assert_eq!(info.candidate.as_deref(), Some("5.0.6"));
    }

    #[test]
    fn policy_virtual() {
        let info = parse_policy("mail-transport-agent", VIRTUAL).unwrap();
        assert_eq!(info.installed, None);
        assert_eq!(info.candidate, None);
    }

    #[test]
    fn policy_unknown() {
        assert_eq!(parse_policy("does-not-exist", ""), None);
    }

    #[test]
    fn reverse_provides() {
        assert_eq!(
            parse_reverse_provides(SHOWPKG),
            vec!["postfix".to_owned(), "exim4-daemon-light".to_owned()]
        );
    }

    #[test]
    fn reverse_provides_absent() {
        assert!(parse_reverse_provides("Package: foo\nReverse Provides: \n").is_empty());
    }

    #[test]
    fn download_size() {
        let output = "'http://updates.example.com/ion/ion-tsconfig_5.0.6_all.deb' ion-tsconfig_5.0.6_all.deb 94123 SHA256:00ff
'http://archive.ubuntu.com/ubuntu/pool/main/o/openssl/libssl1.1_1.1.1f_amd64.deb' libssl1.1_1.1.1f_amd64.deb 1321000 SHA256:ab12
";
        assert_eq!(parse_download_size(output), 94123 + 1321000);
        assert_eq!(parse_download_size(""), 0);
    }
}
