use stackwatch::domain::ControlError;
use stackwatch::symbols::SymbolResolver;

#[test]
fn test_resolver_finds_unmangled_fixture_functions() {
    let binary_path = env!("CARGO_BIN_EXE_stack-fixture");
    let resolver = SymbolResolver::load(binary_path).expect("fixture must parse as ELF");

    assert!(resolver.has_function_symbols());
    let scribble = resolver.function_address("scribble").unwrap();
    let recurse = resolver.function_address("recurse").unwrap();
    assert_ne!(scribble, 0);
    assert_ne!(scribble, recurse);
}

#[test]
fn test_unknown_function_is_symbol_not_found() {
    let binary_path = env!("CARGO_BIN_EXE_stack-fixture");
    let resolver = SymbolResolver::load(binary_path).unwrap();

    let err = resolver.function_address("definitely_not_in_the_image").unwrap_err();
    assert!(matches!(err, ControlError::SymbolNotFound(name) if name == "definitely_not_in_the_image"));
}

#[test]
fn test_labels_cover_function_bodies() {
    // An address a few bytes into scribble should still label as scribble,
    // via DWARF or the symbol table size fallback.
    let binary_path = env!("CARGO_BIN_EXE_stack-fixture");
    let resolver = SymbolResolver::load(binary_path).unwrap();

    let entry = resolver.function_address("scribble").unwrap();
    let label = resolver.function_label(entry + 4);
    assert!(label.contains("scribble"), "got label {label:?}");
}
