use compat_config::{Error, Version, parse_version_output};
use proptest::prelude::*;

proptest! {
    #[test]
    fn version_line_found_anywhere(
        major in 0u64..50,
        minor in 0u64..50,
        patch in 0u64..50,
        before in prop::collection::vec("[a-zA-Z :\\-]{0,30}", 0..4),
        after in prop::collection::vec("[a-zA-Z :=/\\-]{0,30}", 0..4),
    ) {
        let mut lines: Vec<String> = before;
        lines.push(format!("ansible [core {major}.{minor}.{patch}]"));
        lines.extend(after);
        let blob = lines.join("\n");

        let parsed = parse_version_output(&blob).unwrap();
        prop_assert_eq!(parsed, Version::parse(&format!("{major}.{minor}.{patch}")).unwrap());
    }

    #[test]
    fn output_without_version_line_never_parses(text in "[a-z0-9 .\\n]{0,200}") {
        let result = parse_version_output(&text);
        let is_unparsable = matches!(result, Err(Error::UnparsableVersionOutput { .. }));
        prop_assert!(is_unparsable);
    }

    #[test]
    fn ordering_matches_components(
        a in (0u64..20, 0u64..20, 0u64..20),
        b in (0u64..20, 0u64..20, 0u64..20),
    ) {
        let va = Version::parse(&format!("{}.{}.{}", a.0, a.1, a.2)).unwrap();
        let vb = Version::parse(&format!("{}.{}.{}", b.0, b.1, b.2)).unwrap();
        prop_assert_eq!(va.cmp(&vb), a.cmp(&b));
    }
}
