//! Dynamic-vs-static probability update.
//!
//! Works in the sensor frame, in spherical coordinates. Each map point
//! within sensor range is matched to the angularly nearest scan return;
//! the visibility model then weighs how compatible the two ranges are and
//! folds the evidence into the point's dynamic probability. A map point
//! behind the scan's return (occluded) is left untouched, and a point whose
//! probability has crossed the dynamic threshold latches there.

use kiddo::{KdTree, SquaredEuclidean};

use crate::config::MapperConfig;
use crate::core::{PointCloud, Pose};
use crate::error::{Error, Result};

/// Floor weight keeping every factor strictly positive.
const EPS: f32 = 1e-4;

/// Spherical coordinates of a sensor-frame point: radius and
/// (elevation, azimuth). Elevation is 0 in 2D mode and for degenerate
/// zero-radius points.
fn spherical(point: [f32; 3], is_3d: bool) -> (f32, [f32; 2]) {
    let radius = (point[0] * point[0] + point[1] * point[1] + point[2] * point[2]).sqrt();
    let elevation = if is_3d && radius > 0.0 {
        (point[2] / radius).asin()
    } else {
        0.0
    };
    let azimuth = point[1].atan2(point[0]);
    (radius, [elevation, azimuth])
}

/// Update the `probability_dynamic` column of `map_cloud` from the scan
/// `input`. Both clouds are in the world frame; `pose` locates the sensor.
pub(crate) fn update_dynamic_probabilities(
    input: &PointCloud,
    map_cloud: &mut PointCloud,
    pose: &Pose,
    config: &MapperConfig,
) -> Result<()> {
    if input.is_empty() || map_cloud.is_empty() {
        return Ok(());
    }

    let to_sensor = pose.inverse();
    let input_in_sensor = input.transformed(&to_sensor);
    let map_in_sensor = map_cloud.transformed(&to_sensor);

    let normals = map_in_sensor.normals().ok_or_else(|| {
        Error::Config("dynamic-probability update needs a normals column on the map".into())
    })?;

    // Angular index over the scan returns.
    let mut input_radii = Vec::with_capacity(input_in_sensor.len());
    let mut tree: KdTree<f32, 2> = KdTree::new();
    for i in 0..input_in_sensor.len() {
        let (radius, angles) = spherical(input_in_sensor.point(i), config.is_3d);
        input_radii.push(radius);
        tree.add(&angles, i as u64);
    }

    let max_angular_dist = 2.0 * config.beam_half_angle;
    let max_angular_dist_sq = max_angular_dist * max_angular_dist;

    let probabilities = map_cloud.probability_dynamic_mut().ok_or_else(|| {
        Error::Config("dynamic-probability update needs a probability column on the map".into())
    })?;

    for map_id in 0..map_in_sensor.len() {
        let map_point = map_in_sensor.point(map_id);
        let (map_radius, map_angles) = spherical(map_point, config.is_3d);
        if map_radius >= config.sensor_max_range {
            continue;
        }

        let nearest = tree.nearest_one::<SquaredEuclidean>(&map_angles);
        if nearest.distance > max_angular_dist_sq {
            continue;
        }
        let input_id = nearest.item as usize;
        let input_point = input_in_sensor.point(input_id);
        let input_radius = input_radii[input_id];

        let delta = {
            let dx = input_point[0] - map_point[0];
            let dy = input_point[1] - map_point[1];
            let dz = input_point[2] - map_point[2];
            (dx * dx + dy * dy + dz * dz).sqrt()
        };
        let d_max = config.epsilon_a * input_radius;

        // Alignment of the surface normal with the viewing ray.
        let normal = normals[map_id];
        let along_ray = if map_radius > 0.0 {
            ((normal[0] * map_point[0] + normal[1] * map_point[1] + normal[2] * map_point[2])
                / map_radius)
                .abs()
        } else {
            0.0
        };
        let w_v = EPS + (1.0 - EPS) * along_ray;
        let w_d1 = EPS + (1.0 - EPS) * (1.0 - nearest.distance.sqrt() / max_angular_dist);

        let offset = delta - config.epsilon_d;
        let w_d2 = if delta < config.epsilon_d || map_radius > input_radius {
            EPS
        } else if offset < d_max {
            EPS + (1.0 - EPS) * offset / d_max
        } else {
            1.0
        };
        let w_p2 = if delta < config.epsilon_d {
            1.0
        } else if offset < d_max {
            EPS + (1.0 - EPS) * (1.0 - offset / d_max)
        } else {
            EPS
        };

        // Occlusion gate: a map point beyond the return plus tolerances was
        // not observed by this beam.
        if input_radius + config.epsilon_d + d_max >= map_radius {
            let last_dyn = probabilities[map_id];

            let (prob_dynamic, prob_static) = if last_dyn < config.threshold_dynamic {
                let c1 = 1.0 - w_v * w_d1;
                let c2 = w_v * w_d1;
                (
                    c1 * last_dyn
                        + c2 * w_d2 * ((1.0 - config.alpha) * (1.0 - last_dyn)
                            + config.beta * last_dyn),
                    c1 * (1.0 - last_dyn)
                        + c2 * w_p2
                            * (config.alpha * (1.0 - last_dyn)
                                + (1.0 - config.beta) * last_dyn),
                )
            } else {
                (1.0 - EPS, EPS)
            };

            probabilities[map_id] = prob_dynamic / (prob_dynamic + prob_static);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> MapperConfig {
        MapperConfig {
            is_3d: true,
            compute_prob_dynamic: true,
            prior_dynamic: 0.5,
            threshold_dynamic: 0.9,
            beam_half_angle: 0.01,
            epsilon_a: 0.01,
            epsilon_d: 0.01,
            alpha: 0.8,
            beta: 0.99,
            sensor_max_range: 20.0,
            ..Default::default()
        }
    }

    fn map_point_at(x: f32) -> PointCloud {
        let mut cloud = PointCloud::from_points(&[[x, 0.0, 0.0]]);
        cloud.set_normals(vec![[1.0, 0.0, 0.0]]);
        cloud.set_probability_dynamic(vec![0.5]);
        cloud
    }

    #[test]
    fn test_spherical_coordinates() {
        let (radius, angles) = spherical([1.0, 1.0, 0.0], true);
        assert!((radius - std::f32::consts::SQRT_2).abs() < 1e-6);
        assert!(angles[0].abs() < 1e-6);
        assert!((angles[1] - std::f32::consts::FRAC_PI_4).abs() < 1e-6);
    }

    #[test]
    fn test_spherical_is_planar_in_2d() {
        let (_, angles) = spherical([1.0, 0.0, 1.0], false);
        assert_eq!(angles[0], 0.0);
    }

    #[test]
    fn test_occluded_map_point_is_untouched() {
        // Scan return at 3 m, map point at 5 m along the same ray: the map
        // point is hidden behind the return.
        let input = PointCloud::from_points(&[[3.0, 0.0, 0.0]]);
        let mut map_cloud = map_point_at(5.0);

        update_dynamic_probabilities(&input, &mut map_cloud, &Pose::identity(), &test_config())
            .unwrap();

        assert_eq!(map_cloud.probability_dynamic().unwrap()[0], 0.5);
    }

    #[test]
    fn test_seen_through_map_point_turns_dynamic() {
        // Scan return at 5 m, map point at 3 m: the beam passed through
        // where the map point claims a surface.
        let input = PointCloud::from_points(&[[5.0, 0.0, 0.0]]);
        let mut map_cloud = map_point_at(3.0);

        update_dynamic_probabilities(&input, &mut map_cloud, &Pose::identity(), &test_config())
            .unwrap();

        let probability = map_cloud.probability_dynamic().unwrap()[0];
        assert!(probability > 0.5, "probability was {}", probability);
    }

    #[test]
    fn test_confirmed_surface_turns_static() {
        // Scan return on top of the map point: static evidence.
        let input = PointCloud::from_points(&[[3.0, 0.0, 0.0]]);
        let mut map_cloud = map_point_at(3.0);

        update_dynamic_probabilities(&input, &mut map_cloud, &Pose::identity(), &test_config())
            .unwrap();

        let probability = map_cloud.probability_dynamic().unwrap()[0];
        assert!(probability < 0.5, "probability was {}", probability);
    }

    #[test]
    fn test_latches_above_threshold() {
        let input = PointCloud::from_points(&[[5.0, 0.0, 0.0]]);
        let mut map_cloud = map_point_at(3.0);
        map_cloud.set_probability_dynamic(vec![0.95]);

        update_dynamic_probabilities(&input, &mut map_cloud, &Pose::identity(), &test_config())
            .unwrap();

        let probability = map_cloud.probability_dynamic().unwrap()[0];
        assert!((probability - (1.0 - EPS)).abs() < 1e-5);
    }

    #[test]
    fn test_point_outside_beam_cone_is_untouched() {
        let input = PointCloud::from_points(&[[3.0, 0.0, 0.0]]);
        // Same range, but 90 degrees away from the beam.
        let mut map_cloud = {
            let mut cloud = PointCloud::from_points(&[[0.0, 3.0, 0.0]]);
            cloud.set_normals(vec![[0.0, 1.0, 0.0]]);
            cloud.set_probability_dynamic(vec![0.5]);
            cloud
        };

        update_dynamic_probabilities(&input, &mut map_cloud, &Pose::identity(), &test_config())
            .unwrap();

        assert_eq!(map_cloud.probability_dynamic().unwrap()[0], 0.5);
    }

    #[test]
    fn test_missing_normals_is_config_error() {
        let input = PointCloud::from_points(&[[3.0, 0.0, 0.0]]);
        let mut map_cloud = PointCloud::from_points(&[[3.0, 0.0, 0.0]]);
        map_cloud.set_probability_dynamic(vec![0.5]);

        let result =
            update_dynamic_probabilities(&input, &mut map_cloud, &Pose::identity(), &test_config());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
