//! Property-based invariants of the control pipeline.

#![allow(clippy::pedantic, clippy::nursery)]

use optemu_core::{
    Action, ControlRequest, FpgaTransport, HighLevelController, RegisterMap, SensorModelSim,
    EM12_MAP, EM16_MAP,
};
use proptest::prelude::*;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

/// Drives a committed instruction stream through a fresh sensor model
/// and returns the final direct-register image plus all samples.
fn run_through_sim(
    map: &'static RegisterMap,
    streams: &[Vec<optemu_core::Instruction>],
) -> (Vec<(u8, Option<u8>)>, Vec<optemu_core::MotionSample>) {
    let mut sim = SensorModelSim::new(map);
    let words: Vec<u16> = streams
        .iter()
        .flatten()
        .map(|instr| instr.encode().expect("encodable instruction"))
        .collect();
    sim.write_instructions(&words).unwrap();
    while !sim.control(ControlRequest::Status).unwrap().setup_done {
        sim.tick();
    }
    sim.control(ControlRequest::Start).unwrap();
    while !sim.control(ControlRequest::Status).unwrap().fifo_underrun {
        sim.tick();
    }
    let registers = map
        .registers()
        .iter()
        .map(|reg| (reg.addr, sim.register_value(reg.addr)))
        .collect();
    (registers, sim.samples().to_vec())
}

#[rstest]
#[case::em12(&EM12_MAP)]
#[case::em16(&EM16_MAP)]
fn every_commit_emits_exactly_one_send(#[case] map: &'static RegisterMap) {
    let mut hl = HighLevelController::new(map);
    let updates: &[&[Action]] = &[
        &[Action::Dx(1), Action::Dy(1)],
        &[Action::Dx(1), Action::Dy(1)],
        &[Action::Dx(100), Action::PowerModeSleep(Some(true))],
        &[],
        &[Action::Lift(Some(true))],
        &[Action::PowerModeSleep(None), Action::Lift(None)],
    ];
    for batch in updates {
        for action in *batch {
            hl.update(*action).unwrap();
        }
        let instructions = hl.commit().unwrap();
        assert!(!instructions.is_empty());
        let sends = instructions.iter().filter(|instr| instr.send()).count();
        assert_eq!(sends, 1, "batch {batch:?} produced {instructions:?}");
        assert!(instructions.last().unwrap().send());
    }
}

proptest! {
    #[test]
    fn delta_update_order_is_commutative(
        dx in -2048_i16..=2047,
        dy in -2048_i16..=2047,
    ) {
        let mut xy = HighLevelController::new(&EM12_MAP);
        xy.update(Action::Dx(dx)).unwrap();
        xy.update(Action::Dy(dy)).unwrap();
        xy.commit().unwrap();

        let mut yx = HighLevelController::new(&EM12_MAP);
        yx.update(Action::Dy(dy)).unwrap();
        yx.update(Action::Dx(dx)).unwrap();
        yx.commit().unwrap();

        prop_assert_eq!(
            xy.low_level().previous_state().cells(),
            yx.low_level().previous_state().cells()
        );
    }

    #[test]
    fn compression_only_changes_the_encoding(
        deltas in prop::collection::vec((-2048_i16..=2047, -2048_i16..=2047), 1..16),
    ) {
        let mut compressed = HighLevelController::new(&EM12_MAP);
        let mut raw = HighLevelController::new(&EM12_MAP);
        raw.low_level_mut().compress = false;

        let mut compressed_stream = Vec::new();
        let mut raw_stream = Vec::new();
        for (dx, dy) in deltas {
            compressed.update(Action::Dx(dx)).unwrap();
            compressed.update(Action::Dy(dy)).unwrap();
            compressed_stream.push(compressed.commit().unwrap());

            raw.update(Action::Dx(dx)).unwrap();
            raw.update(Action::Dy(dy)).unwrap();
            raw_stream.push(raw.commit().unwrap());
        }

        // Same final controller-side register state.
        prop_assert_eq!(
            compressed.low_level().previous_state().cells(),
            raw.low_level().previous_state().cells()
        );

        // Same DUT-observable behavior: register image and samples.
        let (compressed_regs, compressed_samples) =
            run_through_sim(&EM12_MAP, &compressed_stream);
        let (raw_regs, raw_samples) = run_through_sim(&EM12_MAP, &raw_stream);
        prop_assert_eq!(compressed_regs, raw_regs);
        prop_assert_eq!(compressed_samples, raw_samples);
    }

    #[test]
    fn wide_deltas_roundtrip_through_the_16_bit_map(
        dx in i16::MIN..=i16::MAX,
        dy in i16::MIN..=i16::MAX,
    ) {
        let mut hl = HighLevelController::new(&EM16_MAP);
        hl.update(Action::Dx(dx)).unwrap();
        hl.update(Action::Dy(dy)).unwrap();
        hl.commit().unwrap();
        let state = hl.low_level().previous_state();
        let got = optemu_core::signed_deltas(&EM16_MAP, state);
        prop_assert_eq!(got, (dx, dy));
    }

    #[test]
    fn twelve_bit_deltas_roundtrip_through_the_shared_high_register(
        dx in -2048_i16..=2047,
        dy in -2048_i16..=2047,
    ) {
        let mut hl = HighLevelController::new(&EM12_MAP);
        hl.update(Action::Dx(dx)).unwrap();
        hl.update(Action::Dy(dy)).unwrap();
        hl.commit().unwrap();
        let state = hl.low_level().previous_state();
        let got = optemu_core::signed_deltas(&EM12_MAP, state);
        prop_assert_eq!(got, (dx, dy));
    }
}
