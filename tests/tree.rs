#[cfg(test)]
mod tree {
    use vkcts::case::{FunctionCase, TestRun};
    use vkcts::cases;
    use vkcts::display::DisplayRegistry;
    use vkcts::status::{TestError, TestStatus};
    use vkcts::tree::TestCaseGroup;

    use pretty_assertions::assert_eq;

    fn stub(_: &mut TestRun) -> Result<TestStatus, TestError> {
        Ok(TestStatus::pass("stub"))
    }

    fn case(name: &str) -> Box<FunctionCase> {
        Box::new(FunctionCase::new(name, "stub case", stub))
    }

    fn sample_tree() -> TestCaseGroup {
        let mut root = TestCaseGroup::new("root", "sample tree");

        let mut alpha = TestCaseGroup::new("alpha", "first subgroup");
        alpha.add_case(case("one"));
        alpha.add_case(case("two"));
        root.add_group(alpha);

        let mut beta = TestCaseGroup::new("beta", "second subgroup");
        beta.add_case(case("three"));
        root.add_group(beta);

        root.add_case(case("zero"));

        root
    }

    #[test]
    fn enumeration_is_depth_first_in_insertion_order() {
        let root = sample_tree();

        assert_eq!(
            root.case_paths(),
            vec![
                "root.alpha.one".to_string(),
                "root.alpha.two".to_string(),
                "root.beta.three".to_string(),
                "root.zero".to_string(),
            ]
        );
    }

    #[test]
    fn entries_list_parents_before_children() {
        let root = sample_tree();

        assert_eq!(
            root.entries(),
            vec![
                ("root".to_string(), true),
                ("root.alpha".to_string(), true),
                ("root.alpha.one".to_string(), false),
                ("root.alpha.two".to_string(), false),
                ("root.beta".to_string(), true),
                ("root.beta.three".to_string(), false),
                ("root.zero".to_string(), false),
            ]
        );
    }

    #[test]
    fn find_resolves_full_paths_only() {
        let root = sample_tree();

        let found = root.find("root.alpha.two").expect("case should exist");
        assert_eq!(found.name(), "two");

        assert!(root.find("root.alpha").is_none());
        assert!(root.find("alpha.two").is_none());
        assert!(root.find("root.alpha.none").is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate test node name")]
    fn duplicate_case_name_panics() {
        let mut group = TestCaseGroup::new("group", "dup check");

        group.add_case(case("twin"));
        group.add_case(case("twin"));
    }

    #[test]
    #[should_panic(expected = "duplicate test node name")]
    fn case_shadowing_a_group_panics() {
        let mut group = TestCaseGroup::new("group", "dup check");

        group.add_group(TestCaseGroup::new("twin", "subgroup"));
        group.add_case(case("twin"));
    }

    #[test]
    #[should_panic(expected = "invalid test group name")]
    fn uppercase_group_name_panics() {
        let _ = TestCaseGroup::new("Group", "bad name");
    }

    #[test]
    #[should_panic(expected = "invalid test case name")]
    fn dotted_case_name_panics() {
        let mut group = TestCaseGroup::new("group", "bad name");

        group.add_case(case("a.b"));
    }

    #[test]
    fn full_tree_has_unique_paths() {
        let registry = DisplayRegistry::with_defaults();
        let root = cases::build_root(&registry);
        let paths = root.case_paths();

        assert!(!paths.is_empty());

        for (index, path) in paths.iter().enumerate() {
            assert!(path.starts_with("vkcts."), "stray path {}", path);
            assert!(
                !paths[..index].contains(path),
                "duplicate path {}",
                path
            );
        }
    }

    #[test]
    fn full_tree_contains_every_feature_area() {
        let registry = DisplayRegistry::with_defaults();
        let root = cases::build_root(&registry);
        let paths = root.case_paths();

        for expected in [
            "vkcts.info.instance_version",
            "vkcts.query_pool.occlusion.basic_conservative",
            "vkcts.query_pool.primitives_generated.get_32bit_rast_point_list",
            "vkcts.pipeline.executable_properties.graphics.vertex_stage_fragment_stage",
            "vkcts.memory.external_memory_host.simple_allocation.min_imported_host_pointer_alignment_x1",
            "vkcts.memory.external_memory_host.copy_to_imported_buffer.with_zero_offset",
            "vkcts.mesh_shader.smoke.mesh",
            "vkcts.mesh_shader.smoke.task_mesh",
            "vkcts.wsi.display.enumeration",
            "vkcts.wsi.display.headless.capability_contract",
            "vkcts.wsi.display.headless.surface_smoke",
        ] {
            assert!(
                paths.iter().any(|path| path == expected),
                "missing path {}",
                expected
            );
        }
    }

    #[test]
    fn display_restriction_drops_other_factories() {
        let mut registry = DisplayRegistry::with_defaults();
        assert!(registry.retain("headless"));

        let root = cases::build_root(&registry);
        let paths = root.case_paths();

        assert!(paths
            .iter()
            .any(|path| path == "vkcts.wsi.display.headless.surface_smoke"));
        assert!(!paths
            .iter()
            .any(|path| path.starts_with("vkcts.wsi.display.window.")));
    }
}
