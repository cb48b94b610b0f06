use crate::apt::strip_arch;

/// Checks the `dpkg -l <package>` listing for an `ii` (installed) line naming the package.
///
/// Only the first line which mentions the package is considered.
pub fn is_installed_in_listing(listing: &str, package: &str) -> bool {
    listing
        .lines()
        .find(|line| line.split_whitespace().nth(1).map(strip_arch) == Some(package))
        .is_some_and(|line| line.starts_with("ii"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Desired=Unknown/Install/Remove/Purge/Hold
| Status=Not/Inst/Conf-files/Unpacked/halF-conf/Half-inst/trig-aWait/Trig-pend
|/ Err?=(none)/Reinst-required (Status,Err: uppercase=bad)
||/ Name              Version      Architecture Description
+++-=================-============-============-=================================
";

    #[test]
    fn installed() {
        let listing = [HEADER, "ii  ion-protonupdates 5.0.6        all          Proton updates\n"].concat();
        assert!(is_installed_in_listing(&listing, "ion-protonupdates"));
    }

    #[test]
    fn removed_but_configured() {
        let listing = [HEADER, "rc  ion-protonupdates 5.0.4        all          Proton updates\n"].concat();
        assert!(!is_installed_in_listing(&listing, "ion-protonupdates"));
    }

    #[test]
    fn not_listed() {
        let listing = [HEADER, "ii  ion-pgmupdates    5.0.6        all          PGM updates\n"].concat();
        assert!(!is_installed_in_listing(&listing, "ion-protonupdates"));
        assert!(!is_installed_in_listing("", "ion-protonupdates"));
    }

    #[test]
    fn architecture_qualified_name() {
        let listing = [HEADER, "ii  ion-protonupdates:amd64 5.0.6 amd64 Proton updates\n"].concat();
        assert!(is_installed_in_listing(&listing, "ion-protonupdates"));
    }
}
