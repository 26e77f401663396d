//! Finite-difference checks of every feature's control-space gradient and
//! Hessian, over random trajectories propagated through linear dynamics.

mod common;

use common::{check_derivatives, Scenario, WeightedDistance};
use hri_features::{
    Acceleration, CollisionGaussian, CollisionHR, Dynamics, EuclideanDistance, Feature,
    FeatureInput, GoalReward, GoalRewardLinear, LinearCost, LinearDynamics, TerminationReward,
    Velocity,
};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SEEDS: [u64; 4] = [1, 7, 42, 2024];
const DT: f64 = 0.5;

fn random_goals(rng: &mut StdRng, n_agents: usize, nx: usize) -> DMatrix<f64> {
    // far enough that no state lands on a goal
    DMatrix::from_fn(n_agents, nx, |_, _| {
        let magnitude = rng.gen_range(4.0..6.0);
        if rng.gen_bool(0.5) { magnitude } else { -magnitude }
    })
}

fn single_agent(rng: &mut StdRng, horizon: usize) -> Scenario {
    Scenario::random(rng, LinearDynamics::single_integrator(DT, 2), horizon, 2)
}

#[test]
fn test_velocity_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let s = single_agent(&mut rng, 4);
        check_derivatives(&Velocity, &s);
    }
}

#[test]
fn test_acceleration_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let s = single_agent(&mut rng, 5);
        let u0 = DVector::from_fn(2, |_, _| rng.gen_range(-1.0..1.0));
        check_derivatives(&Acceleration::new(u0, DT).unwrap(), &s);
    }
}

#[test]
fn test_goal_reward_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let s = single_agent(&mut rng, 4);
        // radius comparable to the goal distance keeps the reward well above zero
        let goals = DMatrix::from_row_slice(1, 2, &[rng.gen_range(1.0..2.0), rng.gen_range(1.0..2.0)]);
        check_derivatives(&GoalReward::new(goals, 2.5).unwrap(), &s);
    }
}

#[test]
fn test_goal_reward_linear_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let s = single_agent(&mut rng, 4);
        let goals = random_goals(&mut rng, 1, 2);
        check_derivatives(&GoalRewardLinear::new(goals).unwrap(), &s);
    }
}

#[test]
fn test_termination_reward_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let s = single_agent(&mut rng, 4);
        let goals = random_goals(&mut rng, 1, 2);
        check_derivatives(&TerminationReward::new(goals).unwrap(), &s);
    }
}

#[test]
fn test_collision_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let s = single_agent(&mut rng, 4);
        check_derivatives(&CollisionHR::new(EuclideanDistance::full()), &s);
    }
}

#[test]
fn test_collision_weighted_distance_derivatives() {
    // gradient and Hessian of this distance differ from the plain norm's
    let distance = || WeightedDistance { weights: vec![2.0, 0.5] };
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let s = single_agent(&mut rng, 4);
        check_derivatives(&CollisionHR::new(distance()), &s);
    }

    let dynamics = LinearDynamics::double_integrator(DT, 2);
    let mut rng = StdRng::seed_from_u64(99);
    let s = Scenario::random(&mut rng, dynamics, 3, 4);
    check_derivatives(&CollisionHR::new(distance()), &s);
}

#[test]
fn test_collision_gaussian_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let s = single_agent(&mut rng, 4);
        // radius on the order of the separation keeps every term well above zero
        check_derivatives(&CollisionGaussian::new(6.0).unwrap(), &s);
    }

    let dynamics = LinearDynamics::double_integrator(DT, 2);
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let s = Scenario::random(&mut rng, dynamics.clone(), 3, 4);
        check_derivatives(&CollisionGaussian::positional(6.0, 2).unwrap(), &s);
    }
}

#[test]
fn test_double_integrator_derivatives() {
    // state [px, py, vx, vy] with planar controls: J is not square
    let dynamics = LinearDynamics::double_integrator(DT, 2);
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let s = Scenario::random(&mut rng, dynamics.clone(), 3, 4);
        let goals = random_goals(&mut rng, 1, 4);

        check_derivatives(&GoalRewardLinear::new(goals.clone()).unwrap(), &s);
        check_derivatives(&TerminationReward::new(goals).unwrap(), &s);
        check_derivatives(&CollisionHR::new(EuclideanDistance::positional(2)), &s);
    }
}

#[test]
fn test_multi_agent_goal_derivatives() {
    let dynamics = LinearDynamics::single_integrator(DT, 2).for_agents(2);
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let s = Scenario::random(&mut rng, dynamics.clone(), 3, 2);
        let goals = random_goals(&mut rng, 2, 2);

        check_derivatives(&GoalReward::new(goals.clone(), 6.0).unwrap(), &s);
        check_derivatives(&GoalRewardLinear::new(goals.clone()).unwrap(), &s);
        check_derivatives(&TerminationReward::new(goals).unwrap(), &s);
        check_derivatives(&CollisionHR::new(EuclideanDistance::full()), &s);
        check_derivatives(&CollisionGaussian::new(6.0).unwrap(), &s);
    }
}

#[test]
fn test_single_timestep_derivatives() {
    let mut rng = StdRng::seed_from_u64(3);
    let s = single_agent(&mut rng, 1);
    let goals = random_goals(&mut rng, 1, 2);

    check_derivatives(&Velocity, &s);
    check_derivatives(&Acceleration::new(DVector::zeros(2), DT).unwrap(), &s);
    check_derivatives(&GoalReward::new(goals.clone(), 6.0).unwrap(), &s);
    check_derivatives(&GoalRewardLinear::new(goals.clone()).unwrap(), &s);
    check_derivatives(&TerminationReward::new(goals).unwrap(), &s);
    check_derivatives(&CollisionHR::new(EuclideanDistance::full()), &s);
    check_derivatives(&CollisionGaussian::new(6.0).unwrap(), &s);
}

#[test]
fn test_linear_cost_derivatives() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let s = single_agent(&mut rng, 4);
        let goals = random_goals(&mut rng, 1, 2);

        let cost = LinearCost::new()
            .with_feature(1.0, Velocity)
            .with_feature(0.3, Acceleration::new(DVector::zeros(2), DT).unwrap())
            .with_feature(-4.0, GoalReward::new(goals.clone(), 6.0).unwrap())
            .with_feature(0.5, TerminationReward::new(goals).unwrap())
            .with_feature(2.0, CollisionHR::new(EuclideanDistance::full()));
        check_derivatives(&cost, &s);

        let rollout = s.dynamics.propagate(&s.x0, &s.u).unwrap();
        let input = FeatureInput::from_rollout(&rollout, &s.u, &s.xr, &s.ur);
        let total: f64 = cost
            .feature_values(&input)
            .unwrap()
            .iter()
            .zip(cost.weights())
            .map(|(v, w)| v * w)
            .sum();
        assert!((cost.value(&input).unwrap() - total).abs() < 1e-9);
    }
}
