//! End-to-end gain calculation scenarios
//!
//! Runs full metadata blocks through the calculator on the 0+5+0
//! layout and checks the emitted direct/diffuse vectors:
//! - point sources land on their speakers
//! - phantom sources split symmetrically
//! - channel lock, divergence and zone exclusion behave per
//!   Rec. ITU-R BS.2127-1
//! - LFE stays silent and energy is conserved

use aura_spatial::{
    Channel, ChannelLock, ExclusionZone, GainCalculator, Layout, ObjectDivergence, ObjectMetadata,
    PointSourcePanner, PolarPosition,
};

fn calculator() -> GainCalculator {
    GainCalculator::new(Layout::named("0+5+0").unwrap()).unwrap()
}

fn render(calc: &mut GainCalculator, metadata: &ObjectMetadata) -> (Vec<f64>, Vec<f64>) {
    let mut direct = Vec::new();
    let mut diffuse = Vec::new();
    calc.calculate_gains(metadata, &mut direct, &mut diffuse).unwrap();
    (direct, diffuse)
}

fn source_at(azimuth: f64, elevation: f64) -> ObjectMetadata {
    ObjectMetadata {
        position: PolarPosition::new(azimuth, elevation, 1.0).into(),
        ..Default::default()
    }
}

fn l2(v: &[f64]) -> f64 {
    v.iter().map(|g| g * g).sum::<f64>().sqrt()
}

fn index(calc: &GainCalculator, name: &str) -> usize {
    calc.layout().channel_index(name).unwrap()
}

#[test]
fn straight_ahead_hits_centre_only() {
    let mut calc = calculator();
    let (direct, diffuse) = render(&mut calc, &source_at(0.0, 0.0));

    assert_eq!(direct.len(), 6);
    assert_eq!(diffuse.len(), 6);
    let centre = index(&calc, "M+000");
    assert!((direct[centre] - 1.0).abs() < 1e-9, "{direct:?}");
    for (i, g) in direct.iter().enumerate() {
        if i != centre {
            assert!(g.abs() < 1e-9, "leak onto channel {i}");
        }
    }
    assert!(diffuse.iter().all(|&g| g == 0.0));
}

#[test]
fn centreless_layout_splits_front_pair() {
    let layout = Layout::new(
        "0+5+0 without centre",
        vec![
            Channel::new("M+030", 30.0, 0.0),
            Channel::new("M-030", -30.0, 0.0),
            Channel::new("LFE1", 45.0, -30.0),
            Channel::new("M+110", 110.0, 0.0),
            Channel::new("M-110", -110.0, 0.0),
        ],
    );
    let mut calc = GainCalculator::new(layout).unwrap();
    let (direct, _) = render(&mut calc, &source_at(0.0, 0.0));

    let l = index(&calc, "M+030");
    let r = index(&calc, "M-030");
    assert!((direct[l] - direct[r]).abs() < 1e-9);
    assert!(direct[l] > 0.5);
    assert!((l2(&direct) - 1.0).abs() < 1e-9);
    assert_eq!(direct[index(&calc, "LFE1")], 0.0);
    assert!(direct[index(&calc, "M+110")].abs() < 1e-9);
}

#[test]
fn channel_lock_snaps_to_nearest_speaker() {
    let mut calc = calculator();
    let mut metadata = source_at(29.0, 0.0);
    metadata.channel_lock = Some(ChannelLock {
        max_distance: Some(10f64.to_radians()),
    });
    let (direct, _) = render(&mut calc, &metadata);

    let locked = index(&calc, "M+030");
    assert!((direct[locked] - 1.0).abs() < 1e-9, "{direct:?}");
    assert!((l2(&direct) - 1.0).abs() < 1e-9);
}

#[test]
fn diffuse_split_preserves_total_power() {
    let mut calc = calculator();
    let mut metadata = source_at(0.0, 0.0);
    metadata.gain = 2.0;
    metadata.diffuse = 0.25;
    let (direct, diffuse) = render(&mut calc, &metadata);

    let centre = index(&calc, "M+000");
    assert!((direct[centre] - 2.0 * 0.75f64.sqrt()).abs() < 1e-9);
    assert!((diffuse[centre] - 2.0 * 0.25f64.sqrt()).abs() < 1e-9);
    // ||direct||^2 + ||diffuse||^2 == gain^2
    let total = l2(&direct).powi(2) + l2(&diffuse).powi(2);
    assert!((total - 4.0).abs() < 1e-9);
}

#[test]
fn divergence_mixes_three_panned_sources() {
    let mut calc = calculator();
    let mut metadata = source_at(0.0, 0.0);
    metadata.object_divergence = Some(ObjectDivergence {
        value: 0.5,
        azimuth_range: 45.0,
        position_range: 0.0,
    });
    let (direct, _) = render(&mut calc, &metadata);

    // Equal thirds of the three point-source renderings
    let psp = PointSourcePanner::new(&Layout::named("0+5+0").unwrap().without_lfe()).unwrap();
    let mut expected = vec![0.0; 5];
    let mut tmp = Vec::new();
    for az in [0.0, 45.0, -45.0] {
        psp.calculate_gains(&PolarPosition::new(az, 0.0, 1.0).to_cartesian(), &mut tmp);
        for (e, t) in expected.iter_mut().zip(tmp.iter()) {
            *e += t * t / 3.0;
        }
    }
    let expected: Vec<f64> = expected.iter().map(|p| p.sqrt()).collect();

    let no_lfe: Vec<f64> = direct
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 3)
        .map(|(_, &g)| g)
        .collect();
    for (g, e) in no_lfe.iter().zip(expected.iter()) {
        assert!((g - e).abs() < 1e-9, "{no_lfe:?} vs {expected:?}");
    }

    // Symmetric between the left and right halves
    assert!((direct[index(&calc, "M+030")] - direct[index(&calc, "M-030")]).abs() < 1e-9);
    assert!((l2(&direct) - 1.0).abs() < 1e-9);
}

#[test]
fn zone_exclusion_redistributes_rear_energy() {
    let mut calc = calculator();
    let mut metadata = source_at(180.0, 0.0);
    metadata.exclusion_zones = vec![ExclusionZone::Polar {
        min_azimuth: 100.0,
        max_azimuth: -100.0,
        min_elevation: -90.0,
        max_elevation: 90.0,
    }];
    let (direct, _) = render(&mut calc, &metadata);

    // The surround pair is silent, its energy lands on the sides
    assert!(direct[index(&calc, "M+110")].abs() < 1e-12);
    assert!(direct[index(&calc, "M-110")].abs() < 1e-12);
    let l = direct[index(&calc, "M+030")];
    let r = direct[index(&calc, "M-030")];
    assert!((l - r).abs() < 1e-9);
    assert!(l > 0.5);
    assert!((l2(&direct) - 1.0).abs() < 1e-9);
}

#[test]
fn lfe_is_always_silent() {
    let mut calc = calculator();
    let lfe = index(&calc, "LFE1");
    for az in [-150, -90, -30, 0, 30, 90, 150] {
        for el in [-60, 0, 60] {
            let mut metadata = source_at(az as f64, el as f64);
            metadata.width = 30.0;
            metadata.diffuse = 0.5;
            let (direct, diffuse) = render(&mut calc, &metadata);
            assert_eq!(direct[lfe], 0.0);
            assert_eq!(diffuse[lfe], 0.0);
        }
    }
}

#[test]
fn energy_is_preserved_across_directions() {
    for name in ["0+5+0", "4+5+0", "4+9+0"] {
        let mut calc = GainCalculator::new(Layout::named(name).unwrap()).unwrap();
        for az in [-135, -60, 0, 45, 120, 180] {
            for el in [-30, 0, 25, 70] {
                let (direct, _) = render(&mut calc, &source_at(az as f64, el as f64));
                assert!(
                    (l2(&direct) - 1.0).abs() < 1e-6,
                    "{name} at ({az}, {el}): {direct:?}"
                );
            }
        }
    }
}

#[test]
fn extended_source_keeps_unit_energy() {
    let mut calc = calculator();
    let mut metadata = source_at(30.0, 0.0);
    metadata.width = 60.0;
    metadata.height = 20.0;
    let (direct, _) = render(&mut calc, &metadata);
    assert!((l2(&direct) - 1.0).abs() < 1e-6);
    // The spread reaches beyond a single speaker
    let lit = direct.iter().filter(|&&g| g > 0.05).count();
    assert!(lit >= 2, "{direct:?}");
}

#[test]
fn cartesian_metadata_is_converted_for_polar_layouts() {
    let mut calc = calculator();
    // ADM cartesian front-centre
    let metadata = ObjectMetadata {
        position: aura_spatial::CartesianPosition::new(0.0, 1.0, 0.0).into(),
        cartesian: true,
        ..Default::default()
    };
    let (direct, _) = render(&mut calc, &metadata);
    let centre = index(&calc, "M+000");
    assert!((direct[centre] - 1.0).abs() < 1e-9, "{direct:?}");
}

#[test]
fn allocentric_layout_renders_cartesian_path() {
    let layout = Layout::named("0+5+0")
        .unwrap()
        .with_allocentric(true)
        .unwrap();
    let mut calc = GainCalculator::new(layout).unwrap();

    // Polar metadata is converted onto the cube and panned there
    let (direct, _) = render(&mut calc, &source_at(0.0, 0.0));
    let centre = index(&calc, "M+000");
    assert!((direct[centre] - 1.0).abs() < 1e-9, "{direct:?}");
    assert!((l2(&direct) - 1.0).abs() < 1e-9);
}

#[test]
fn screen_scaling_moves_screen_referenced_sources() {
    let wide = aura_spatial::Screen {
        centre_azimuth: 0.0,
        width_azimuth: 90.0,
        aspect_ratio: 1.78,
    };
    let mut calc = GainCalculator::new(Layout::named("0+5+0").unwrap())
        .unwrap()
        .with_screen(wide);

    // The nominal screen edge maps to the wide screen edge at az 45,
    // landing between the front and surround speakers
    let mut metadata = source_at(29.0, 0.0);
    metadata.screen_ref = true;
    let (direct, _) = render(&mut calc, &metadata);
    assert!(direct[index(&calc, "M+030")] > 0.1, "{direct:?}");
    assert!(direct[index(&calc, "M+110")] > 0.1, "{direct:?}");

    // Without the flag the same source stays on the front pair
    metadata.screen_ref = false;
    let (direct, _) = render(&mut calc, &metadata);
    assert!(direct[index(&calc, "M+110")].abs() < 1e-9);
}

#[test]
fn invalid_metadata_is_rejected() {
    let mut calc = calculator();
    let mut direct = Vec::new();
    let mut diffuse = Vec::new();

    let mut metadata = source_at(0.0, 0.0);
    metadata.gain = -0.5;
    assert!(calc
        .calculate_gains(&metadata, &mut direct, &mut diffuse)
        .is_err());

    let metadata = source_at(0.0, 100.0);
    assert!(calc
        .calculate_gains(&metadata, &mut direct, &mut diffuse)
        .is_err());
}
