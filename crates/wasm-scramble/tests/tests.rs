use wasm_scramble::module::{decode_name_section, is_name_section, ModuleValue};
use wasm_scramble::schema::Value;
use wasm_scramble::tree::ParseTree;
use wasm_scramble::{TierStrategy, WasmScramble};

/// A module exercising every section kind the schema knows about except
/// custom and data-count sections, which are covered separately below.
const EVERY_SECTION: &str = r#"
    (module
        (import "env" "f" (func $imported (param i32) (result i32)))
        (import "env" "t" (table 1 funcref))
        (import "env" "m" (memory 1))
        (import "env" "g" (global i32))
        (table $tab 2 8 funcref)
        (memory 1 4)
        (global $counter (mut i32) (i32.const 7))
        (func $main
            nop
        )
        (func $add (param i32 i32) (result i32)
            (local i64)
            local.get 0
            local.get 1
            i32.add
        )
        (export "main" (func $main))
        (export "tab" (table $tab))
        (start $main)
        (elem (i32.const 0) func $main $add)
        (data (i32.const 8) "hello wasm")
    )
"#;

fn decode_roundtrip(wasm: &[u8]) -> ModuleValue {
    let module = ModuleValue::decode(wasm).unwrap();
    assert_eq!(module.encode().unwrap(), wasm, "round-trip must be byte-exact");
    module
}

#[test]
fn roundtrip_identity_for_every_section_kind() {
    let _ = env_logger::try_init();
    let wasm = wat::parse_str(EVERY_SECTION).unwrap();
    let module = decode_roundtrip(&wasm);
    // type, import, function, table, memory, global, export, start,
    // element, code, data
    assert_eq!(module.sections.len(), 11);
}

#[test]
fn roundtrip_identity_for_data_count_section() {
    // Raw bytes: wat only emits a data-count section for bulk-memory code.
    let mut wasm = vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
    wasm.extend_from_slice(&[0x0c, 0x01, 0x02]);
    let module = decode_roundtrip(&wasm);
    let Some(Value::Struct(payload)) = module.sections[0].value("payload") else {
        panic!("expected a data-count payload");
    };
    assert_eq!(payload.u64("count"), 2);
}

#[test]
fn minimal_module_scenario() {
    // Header plus one empty type section: 11 bytes.
    let wasm: &[u8] = &[
        0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, 0x01, 0x01, 0x00,
    ];
    let module = decode_roundtrip(wasm);
    assert_eq!(module.sections.len(), 1);
    let Some(Value::Struct(payload)) = module.sections[0].value("payload") else {
        panic!("expected a type section payload");
    };
    assert_eq!(payload.cardinality("entries"), 0);

    // Exactly one section root in the parse tree.
    let tree = ParseTree::build(&module);
    let roots = tree.nodes().iter().filter(|n| n.path == "section").count();
    assert_eq!(roots, 1);
}

#[test]
fn mutated_outputs_stay_container_consistent() {
    let _ = env_logger::try_init();
    let wasm = wat::parse_str(EVERY_SECTION).unwrap();

    let mut changed = 0;
    for seed in 0..300 {
        let mut scramble = WasmScramble::default();
        scramble.seed(seed);
        let mutated = scramble.run(&wasm).unwrap();

        // The mutated buffer may be arbitrarily invalid Wasm, but its
        // container bookkeeping must survive a full re-decode.
        let reparsed = ModuleValue::decode(&mutated)
            .unwrap_or_else(|e| panic!("seed {seed} broke the container: {e}"));
        assert_eq!(reparsed.encode().unwrap(), mutated);

        if mutated != wasm {
            changed += 1;
        }
    }
    // A healthy share of iterations hits a node it can actually perturb;
    // the rest land on derived fields, empty conditionals, or floors.
    assert!(changed > 40, "only {changed}/300 seeds changed the module");
}

#[test]
fn iterations_can_be_chained() {
    let _ = env_logger::try_init();
    let mut wasm = wat::parse_str(EVERY_SECTION).unwrap();
    let mut scramble = WasmScramble::default();
    scramble.seed(11);
    for _ in 0..25 {
        wasm = scramble.run(&wasm).unwrap();
    }
    assert_eq!(scramble.stats().iterations(), 25);
}

#[test]
fn every_tier_strategy_runs() {
    let _ = env_logger::try_init();
    let wasm = wat::parse_str(EVERY_SECTION).unwrap();
    let strategies = [
        TierStrategy::Uniform,
        TierStrategy::Roulette(vec![1.0, 2.0, 3.0, 2.0, 1.0]),
        TierStrategy::EpsilonGreedy {
            epsilon: 0.1,
            adaptive: true,
        },
        TierStrategy::Thompson { adaptive: false },
    ];
    for strategy in strategies {
        let mut scramble = WasmScramble::default();
        scramble.seed(5).tier_strategy(strategy);
        for _ in 0..20 {
            let mutated = scramble.run(&wasm).unwrap();
            ModuleValue::decode(&mutated).unwrap();
            // The feedback channel accepts a reward whether or not the
            // strategy learns from it.
            scramble.report_reward(0.5);
        }
    }
}

#[test]
fn auxiliary_corpus_material_feeds_the_splice() {
    let _ = env_logger::try_init();
    let wasm = wat::parse_str(EVERY_SECTION).unwrap();
    let aux = wat::parse_str(
        r#"
        (module
            (func $a (param i64 i64 f32) (result i64)
                local.get 0)
            (func $b nop)
        )
        "#,
    )
    .unwrap();

    let mut scramble = WasmScramble::default();
    scramble.seed(23);
    for _ in 0..100 {
        let mutated = scramble.run_with_aux(&wasm, Some(&aux)).unwrap();
        let reparsed = ModuleValue::decode(&mutated).unwrap();
        assert_eq!(reparsed.encode().unwrap(), mutated);
    }

    // A malformed auxiliary buffer is ignored, not an error.
    let mutated = scramble.run_with_aux(&wasm, Some(b"not wasm")).unwrap();
    ModuleValue::decode(&mutated).unwrap();
}

#[test]
fn name_section_is_recognized_and_decodes() {
    let mut wasm = vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
    // Custom section "name" carrying one function-names subsection.
    let subsection = [
        0x01, 0x07, // name_type 1 (function names), payload_len 7
        0x01, // count 1
        0x00, 0x04, b'm', b'a', b'i', b'n', // index 0 -> "main"
    ];
    let mut content = vec![0x04];
    content.extend_from_slice(b"name");
    content.extend_from_slice(&subsection);
    wasm.push(0x00); // custom section id
    wasm.push(content.len() as u8);
    wasm.extend_from_slice(&content);

    let module = decode_roundtrip(&wasm);
    let section = &module.sections[0];
    assert!(is_name_section(section));

    let Some(Value::Bytes(payload)) = section.value("payload") else {
        panic!("expected the raw name-section payload");
    };
    let subsections = decode_name_section(payload).unwrap();
    assert_eq!(subsections.len(), 1);
    let Some(Value::Struct(map)) = subsections[0].value("payload") else {
        panic!("expected a function name map");
    };
    assert_eq!(map.u64("count"), 1);
}

#[test]
fn garbage_input_is_a_structured_error() {
    let mut scramble = WasmScramble::default();
    scramble.seed(0);
    for garbage in [&b""[..], &b"\x00asm"[..], &[0xff; 64][..]] {
        assert!(scramble.run(garbage).is_err());
    }
    // Three failed iterations, all tallied.
    assert_eq!(scramble.stats().iterations(), 3);
    assert_eq!(scramble.stats().failures().values().sum::<u64>(), 3);
}
