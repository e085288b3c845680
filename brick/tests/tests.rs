#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::sync::mpsc::Receiver;
    use std::time::Duration;

    use itertools::Itertools;
    use rand::prelude::SmallRng;
    use rand::{Rng, SeedableRng};
    use test_case::test_case;

    use brick::classic_brick::ClassicBrick;
    use brick::config::BrickConfig;
    use brick::driver;
    use brick::io;
    use brick::io::input::PreSliced;
    use brick::scheduler::SequentialScheduler;
    use meshbits::entities::{Bit, Pavement};
    use meshbits::geometry::{Region, Winding};
    use meshbits::geometry::primitives::Point;
    use meshbits::pipeline::{EventPayload, Mesh, MeshError, MeshMessage, MeshState};
    use meshbits::util::{CraftConfig, EPSILON, ExecutorConfig, lock};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn asset(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../assets")
            .join(name)
    }

    fn solution_folder(name: &str) -> PathBuf {
        let folder = std::env::temp_dir().join(format!("brick_tests_{name}"));
        std::fs::create_dir_all(&folder).unwrap();
        folder
    }

    fn sliced_mesh(input: &PreSliced, config: BrickConfig) -> Mesh {
        let mut mesh = Mesh::new(config.craft, config.executor).unwrap();
        mesh.import(input).unwrap();
        mesh.slice(input).unwrap();
        mesh
    }

    /// Collects messages until a stable state is published
    fn collect_until_stable(rx: &Receiver<MeshMessage>) -> Vec<MeshMessage> {
        let mut messages = vec![];
        loop {
            let message = rx.recv_timeout(Duration::from_secs(120)).unwrap();
            let stable = !message.state.is_working()
                && !matches!(
                    message.state,
                    MeshState::PavedLayer | MeshState::OptimizedLayer
                );
            messages.push(message);
            if stable {
                return messages;
            }
        }
    }

    fn assert_bits_inside_layers(mesh: &Mesh) {
        for layer in mesh.layers() {
            let layer = lock(layer);
            for bit3d in layer.bits3d() {
                assert!(
                    bit3d.bit().area().is_subset_of(layer.region(), EPSILON),
                    "bit at {} leaves layer {}",
                    bit3d.key(),
                    layer.index()
                );
            }
        }
    }

    #[test_case("ring_tower.json"; "ring_tower")]
    #[test_case("cone.json"; "cone")]
    fn test_full_run(input_name: &str) {
        init();
        let input: PreSliced = io::read_json(&asset(input_name)).unwrap();
        let config = BrickConfig {
            optimize: true,
            ..BrickConfig::default()
        };
        let solution_path = solution_folder(input.name.as_str()).join("sol.json");

        let mesh = driver::run(&input, config, solution_path.clone()).unwrap();
        assert_eq!(mesh.state(), MeshState::Exported);
        assert_eq!(mesh.n_layers(), input.slices.len());
        assert_bits_inside_layers(&mesh);

        // the mesh count is the sum of the per layer counts
        let per_layer: usize = (0..mesh.n_layers())
            .map(|i| mesh.layer_snapshot(i).unwrap().count_irregularities())
            .sum();
        assert_eq!(per_layer, mesh.count_irregularities());
        for layer in mesh.layers() {
            let layer = lock(layer);
            for bit3d in layer.bits3d() {
                let has_ungrippable_piece = bit3d
                    .bit()
                    .sub_bits()
                    .iter()
                    .any(|sb| !sb.is_removed() && sb.grip_point().is_none());
                assert_eq!(bit3d.is_irregular(), has_ungrippable_piece);
                assert_eq!(
                    layer.irregular_keys().contains(&bit3d.key()),
                    has_ungrippable_piece
                );
            }
        }

        let solution: serde_json::Value = io::read_json(&solution_path).unwrap();
        let n_bits: usize = mesh.layers().iter().map(|l| lock(l).bits3d().count()).sum();
        assert_eq!(solution["n_bits"].as_u64(), Some(n_bits as u64));
        assert_eq!(solution["bits"].as_array().map(|b| b.len()), Some(n_bits));
        assert_eq!(
            solution["mesh"]["layers"].as_array().map(|l| l.len()),
            Some(mesh.n_layers())
        );
        assert_eq!(solution["config"]["bits_offset"].as_f64(), Some(3.0));
        // classic brick has no optimization, every layer stays unsolved
        let summary = solution["summary"].as_str().unwrap();
        let unsolved = (0..mesh.n_layers()).join(" ");
        assert!(summary.ends_with(&format!("Layers which can not be solved: {unsolved}")));
    }

    #[test]
    fn parallel_pave_notifies_once() {
        init();
        let input: PreSliced = io::read_json(&asset("cone.json")).unwrap();
        let config = BrickConfig {
            executor: ExecutorConfig { n_workers: 4 },
            ..BrickConfig::default()
        };
        let mesh = sliced_mesh(&input, config);
        assert_eq!(mesh.n_layers(), 10);
        let rx = mesh.events().subscribe_channel();
        mesh.pave(Box::new(ClassicBrick::new(config.bits_offset)))
            .unwrap();

        let messages = collect_until_stable(&rx);
        let paved_layers = messages
            .iter()
            .filter_map(|m| match (&m.state, &m.payload) {
                (MeshState::PavedLayer, EventPayload::Layer { index, snapshot }) => {
                    assert!(snapshot.is_paved());
                    Some(*index)
                }
                _ => None,
            })
            .collect::<BTreeSet<_>>();
        assert_eq!(paved_layers, (0..10).collect::<BTreeSet<_>>());
        assert_eq!(messages.last().map(|m| m.state), Some(MeshState::PavedMesh));
        assert_eq!(
            messages
                .iter()
                .filter(|m| m.state == MeshState::PavedMesh)
                .count(),
            1
        );
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn layers_are_rotated_alternately() {
        init();
        let input: PreSliced = io::read_json(&asset("ring_tower.json")).unwrap();
        let config = BrickConfig::default();
        let mesh = sliced_mesh(&input, config);
        let rx = mesh.events().subscribe_channel();
        mesh.pave(Box::new(ClassicBrick::default())).unwrap();
        driver::await_state(&rx, MeshState::PavedMesh).unwrap();

        for (i, layer) in mesh.layers().iter().enumerate() {
            let layer = lock(layer);
            let expected = ClassicBrick::rotation(i);
            assert!(
                layer
                    .bits3d()
                    .all(|b| b.bit().orientation().almost_eq(&expected, 1e-6))
            );
        }
    }

    #[test_case(1.0; "margin_1")]
    #[test_case(2.5; "margin_2_5")]
    fn margin_keeps_bits_apart(margin: f64) {
        init();
        let input: PreSliced = io::read_json(&asset("ring_tower.json")).unwrap();
        let config = BrickConfig {
            craft: CraftConfig {
                bit_margin: Some(margin),
                ..CraftConfig::default()
            },
            bits_offset: 0.0,
            ..BrickConfig::default()
        };
        let mesh = sliced_mesh(&input, config);
        let rx = mesh.events().subscribe_channel();
        mesh.pave_layer(1, Box::new(ClassicBrick::new(0.0))).unwrap();
        driver::await_state(&rx, MeshState::PavedLayer).unwrap();

        let layer = lock(&mesh.layers()[1]);
        let grown = layer
            .bits3d()
            .map(|b| b.bit().area().expand(0.45 * margin))
            .collect_vec();
        assert!(grown.len() > 1);
        for (a, b) in grown.iter().tuple_combinations() {
            assert!(a.intersect(b).area() < 1e-6);
        }
        assert!(layer.bits3d().all(|b| {
            b.bit()
                .area()
                .is_subset_of(layer.region(), EPSILON)
        }));
    }

    #[test]
    fn near_equal_keys_replace_bits() {
        let config = CraftConfig::default();
        let mut rng = SmallRng::seed_from_u64(0);
        let mut pavement = Pavement::new(config);
        let origins = (0..20)
            .map(|i| {
                let y: f64 = rng.random_range(-100.0..100.0);
                Point(i as f64 * 130.0, (y * 1000.0).round() / 1000.0)
            })
            .collect_vec();
        for origin in &origins {
            pavement.add_bit(Bit::new(*origin, Point(1.0, 0.0), config).unwrap());
        }
        assert_eq!(pavement.len(), origins.len());

        for origin in &origins {
            let jitter = Point(
                rng.random_range(-1e-7..1e-7),
                rng.random_range(-1e-7..1e-7),
            );
            let shifted = Point(origin.0 + jitter.0, origin.1 + jitter.1);
            let (_, replaced) =
                pavement.insert_bit(Bit::new(shifted, Point(0.0, 1.0), config).unwrap());
            let (replaced_key, replaced_bit) = replaced.unwrap();
            assert!(replaced_key.point().almost_eq(origin, 1e-5));
            assert!(replaced_bit.orientation().almost_eq(&Point(1.0, 0.0), 1e-9));
            assert_eq!(pavement.len(), origins.len());
        }
    }

    #[test]
    fn schedule_assigns_grippable_bits() {
        init();
        let input: PreSliced = io::read_json(&asset("ring_tower.json")).unwrap();
        let config = BrickConfig::default();
        let mesh = sliced_mesh(&input, config);
        let rx = mesh.events().subscribe_channel();
        mesh.pave(Box::new(ClassicBrick::default())).unwrap();
        driver::await_state(&rx, MeshState::PavedMesh).unwrap();

        let scheduler = SequentialScheduler { bits_per_plate: 5 };
        mesh.schedule(Arc::new(scheduler)).unwrap();
        driver::await_state(&rx, MeshState::Scheduled).unwrap();

        let mut ranks = vec![];
        for layer in mesh.layers() {
            let layer = lock(layer);
            for bit3d in layer.bits3d() {
                match (bit3d.first_grip_point(), bit3d.assignment()) {
                    (Some(_), Some(assignment)) => {
                        assert_eq!(assignment.batch, layer.index());
                        assert_eq!(assignment.plate, assignment.index / 5);
                        ranks.push(assignment.index);
                    }
                    (None, None) => {}
                    (grip, assignment) => panic!("grip {grip:?} with assignment {assignment:?}"),
                }
            }
        }
        ranks.sort();
        assert!(!ranks.is_empty());
        assert_eq!(ranks, (0..ranks.len()).collect_vec());
    }

    #[test]
    fn saved_mesh_reopens_identically() {
        init();
        let input: PreSliced = io::read_json(&asset("ring_tower.json")).unwrap();
        let config = BrickConfig::default();
        let mesh = sliced_mesh(&input, config);
        let rx = mesh.events().subscribe_channel();
        mesh.pave(Box::new(ClassicBrick::default())).unwrap();
        driver::await_state(&rx, MeshState::PavedMesh).unwrap();

        let ext_mesh = mesh.save().unwrap();
        let json = serde_json::to_string(&ext_mesh).unwrap();
        let reopened = Mesh::open(
            &serde_json::from_str(&json).unwrap(),
            config.craft,
            config.executor,
        )
        .unwrap();
        assert_eq!(reopened.state(), MeshState::Opened);
        assert_eq!(reopened.n_layers(), mesh.n_layers());

        for (original, restored) in mesh.layers().iter().zip_eq(reopened.layers()) {
            let (original, restored) = (lock(original), lock(restored));
            assert_eq!(
                original.bits3d().map(|b| b.key()).collect_vec(),
                restored.bits3d().map(|b| b.key()).collect_vec()
            );
            assert_eq!(original.irregular_keys(), restored.irregular_keys());
            for bit3d in original.bits3d() {
                let other = restored.bit3d(&bit3d.key()).unwrap();
                assert!(
                    bit3d
                        .bit()
                        .area()
                        .approx_eq(&other.bit().area(), config.craft.epsilon())
                );
            }
        }
    }

    #[test]
    fn layer_edits_between_operations() {
        init();
        let input: PreSliced = io::read_json(&asset("ring_tower.json")).unwrap();
        let config = BrickConfig::default();
        let mesh = sliced_mesh(&input, config);
        let rx = mesh.events().subscribe_channel();

        assert!(matches!(
            mesh.optimize(),
            Err(MeshError::MissingPrerequisite { .. })
        ));
        mesh.pave(Box::new(ClassicBrick::default())).unwrap();
        driver::await_state(&rx, MeshState::PavedMesh).unwrap();

        let before = mesh.count_irregularities();
        let n_removed = mesh
            .with_layer_mut(0, |layer| {
                let irregular = layer.irregular_keys().iter().copied().collect_vec();
                layer.remove_bits(&irregular)
            })
            .unwrap();
        assert_eq!(mesh.count_irregularities(), before - n_removed);
        assert_eq!(mesh.layer_snapshot(0).unwrap().count_irregularities(), 0);

        // a bit added by hand is clipped to the layer
        let key = mesh
            .with_layer_mut(0, |layer| {
                let config = *layer.config();
                layer.add_bit(Bit::new(Point(70.0, 0.0), Point(1.0, 0.0), config).unwrap())
            })
            .unwrap();
        let snapshot = mesh.layer_snapshot(0).unwrap();
        let bit3d = &snapshot.bits3d[&key.unwrap()];
        let ring = Region::from_rings(&input.slices[0].polygons, Winding::EvenOdd);
        assert!(bit3d.bit().area().is_subset_of(&ring, EPSILON));
        assert!(bit3d.bit().area().area() < bit3d.bit().full_region().area());
    }
}
