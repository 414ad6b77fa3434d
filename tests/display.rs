#[cfg(test)]
mod display {
    use vkcts::display::{
        DisplayCapability, DisplayCore, DisplayError, DisplayRegistry, HeadlessDisplay,
        HeadlessDisplayFactory, NativeDisplay, NativeDisplayFactory, PlatformType,
    };

    use std::ffi::CStr;

    #[test]
    fn platform_bits_exclude_the_legacy_mechanism() {
        let bits = DisplayCapability::platform_bits();

        assert!(bits.contains(DisplayCapability::GET_DISPLAY_PLATFORM));
        assert!(bits.contains(DisplayCapability::GET_DISPLAY_PLATFORM_EXT));
        assert!(!bits.contains(DisplayCapability::GET_DISPLAY_LEGACY));
    }

    #[test]
    fn legacy_core_keeps_its_flags() {
        let core = DisplayCore::legacy(DisplayCapability::GET_DISPLAY_LEGACY);

        assert_eq!(core.capabilities(), DisplayCapability::GET_DISPLAY_LEGACY);
        assert_eq!(core.platform_type(), PlatformType::None);
    }

    #[test]
    #[should_panic(expected = "legacy display must not advertise platform capabilities")]
    fn legacy_core_rejects_platform_bits() {
        let _ = DisplayCore::legacy(
            DisplayCapability::GET_DISPLAY_LEGACY | DisplayCapability::GET_DISPLAY_PLATFORM,
        );
    }

    #[test]
    #[should_panic(expected = "legacy display must advertise GET_DISPLAY_LEGACY")]
    fn legacy_core_rejects_an_empty_set() {
        let _ = DisplayCore::legacy(DisplayCapability::empty());
    }

    #[test]
    fn platform_core_may_also_carry_the_legacy_bit() {
        let core = DisplayCore::platform(
            DisplayCapability::GET_DISPLAY_LEGACY | DisplayCapability::GET_DISPLAY_PLATFORM,
            PlatformType::Xcb,
        );

        assert!(core.capabilities().contains(DisplayCapability::GET_DISPLAY_LEGACY));
        assert_eq!(core.platform_type(), PlatformType::Xcb);
    }

    #[test]
    #[should_panic(expected = "platform display must advertise a platform capability")]
    fn platform_core_requires_a_platform_bit() {
        let _ = DisplayCore::platform(DisplayCapability::GET_DISPLAY_LEGACY, PlatformType::Xlib);
    }

    #[test]
    #[should_panic(expected = "platform display must name its platform")]
    fn platform_core_requires_a_platform_name() {
        let _ = DisplayCore::platform(DisplayCapability::GET_DISPLAY_PLATFORM, PlatformType::None);
    }

    #[test]
    fn not_supported_errors_name_the_missing_mechanism() {
        let err = DisplayError::NotSupported("legacy native display handle");

        assert_eq!(
            err.to_string(),
            "Display does not support legacy native display handle"
        );
    }

    #[test]
    fn headless_display_honours_its_advertised_capabilities() {
        let display = HeadlessDisplay::new();

        assert_eq!(display.capabilities(), DisplayCapability::GET_DISPLAY_PLATFORM);
        assert_eq!(display.platform_type(), PlatformType::Headless);

        let native = display.platform_native().expect("platform handle");
        assert!(native.is_null());

        let attributes = display.platform_attributes().expect("attribute list");
        assert!(attributes.is_empty());

        assert!(matches!(
            display.legacy_native(),
            Err(DisplayError::NotSupported(_))
        ));
    }

    #[test]
    fn headless_display_requires_the_headless_surface_extension() {
        let display = HeadlessDisplay::new();

        let names: Vec<String> = display
            .required_extensions()
            .into_iter()
            .map(|ptr| {
                unsafe { CStr::from_ptr(ptr) }
                    .to_str()
                    .expect("extension names are ASCII")
                    .to_string()
            })
            .collect();

        assert!(names.iter().any(|name| name == "VK_KHR_surface"));
        assert!(names.iter().any(|name| name == "VK_EXT_headless_surface"));
    }

    #[test]
    fn factory_and_display_agree_on_capabilities() {
        let factory = HeadlessDisplayFactory;
        let display = factory.create(&[]).expect("headless factory cannot fail");

        assert_eq!(display.capabilities(), factory.capabilities());
        assert_eq!(factory.name(), "headless");
        assert!(!factory.description().is_empty());
    }

    #[test]
    fn default_registry_always_offers_headless() {
        let registry = DisplayRegistry::with_defaults();

        assert!(!registry.is_empty());
        assert!(registry.find("headless").is_some());
        assert!(registry.find("absent").is_none());
    }

    #[test]
    fn factory_names_are_unique_within_the_registry() {
        let registry = DisplayRegistry::with_defaults();
        let names: Vec<&str> = registry.factories().map(|factory| factory.name()).collect();

        for (index, name) in names.iter().enumerate() {
            assert!(!names[..index].contains(name), "duplicate factory {}", name);
        }
    }

    #[test]
    fn retain_narrows_to_one_factory() {
        let mut registry = DisplayRegistry::with_defaults();

        assert!(registry.retain("headless"));
        assert_eq!(registry.len(), 1);
        assert!(registry.find("headless").is_some());
    }

    #[test]
    fn retain_of_an_unknown_name_keeps_the_registry() {
        let mut registry = DisplayRegistry::with_defaults();
        let before = registry.len();

        assert!(!registry.retain("absent"));
        assert_eq!(registry.len(), before);
    }

    #[test]
    #[should_panic(expected = "duplicate display factory name")]
    fn registering_the_same_name_twice_panics() {
        let mut registry = DisplayRegistry::new();

        registry.register(Box::new(HeadlessDisplayFactory));
        registry.register(Box::new(HeadlessDisplayFactory));
    }
}
