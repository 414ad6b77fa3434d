#[cfg(test)]
mod filter {
    use vkcts::tree::{matches_any, matches_pattern};

    #[test]
    fn literal_patterns_match_exactly() {
        assert!(matches_pattern(
            "vkcts.info.instance_version",
            "vkcts.info.instance_version"
        ));
        assert!(!matches_pattern(
            "vkcts.info.instance_version",
            "vkcts.info.instance"
        ));
        assert!(!matches_pattern(
            "vkcts.info.instance",
            "vkcts.info.instance_version"
        ));
    }

    #[test]
    fn star_crosses_path_separators() {
        assert!(matches_pattern("*", "vkcts.info.instance_version"));
        assert!(matches_pattern("vkcts.*", "vkcts.info.instance_version"));
        assert!(matches_pattern("*.instance_version", "vkcts.info.instance_version"));
        assert!(matches_pattern("vkcts.*.basic", "vkcts.query_pool.occlusion.basic"));
    }

    #[test]
    fn star_may_match_nothing() {
        assert!(matches_pattern("a*b", "ab"));
        assert!(matches_pattern("ab*", "ab"));
        assert!(matches_pattern("*ab", "ab"));
        assert!(matches_pattern("*", ""));
    }

    #[test]
    fn multiple_stars_backtrack() {
        assert!(matches_pattern("a*b*c", "axxbyyc"));
        assert!(!matches_pattern("a*b*c", "axxbyy"));
        assert!(matches_pattern("*query*", "vkcts.query_pool.occlusion.basic"));
        assert!(matches_pattern("*_32*point*", "get_32bit_rast_point_list"));
        assert!(!matches_pattern("*_64*point*", "get_32bit_rast_point_list"));
    }

    #[test]
    fn unconsumed_suffix_fails() {
        assert!(!matches_pattern("*.end", "a.b.endx"));
        assert!(!matches_pattern("start.*", "star.a.b"));
    }

    #[test]
    fn empty_pattern_matches_empty_path_only() {
        assert!(matches_pattern("", ""));
        assert!(!matches_pattern("", "x"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(!matches_pattern("VKCTS.*", "vkcts.info.instance_version"));
    }

    #[test]
    fn any_of_several_patterns_selects() {
        let patterns = vec!["nope".to_string(), "vkcts.info.*".to_string()];

        assert!(matches_any(&patterns, "vkcts.info.instance_version"));
        assert!(!matches_any(&patterns, "vkcts.mesh_shader.smoke.mesh"));
        assert!(!matches_any(&[], "vkcts.info.instance_version"));
    }
}
