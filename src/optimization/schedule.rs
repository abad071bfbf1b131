use super::types::{
    JobAssignment, MachineUtilization, ScheduleAlgorithm, ScheduleRequest, ScheduleResult,
};
use crate::error::{Error, Result};
use tracing::info;
use uuid::Uuid;

/// Upper bound on local-search moves per job
const MOVES_PER_JOB: usize = 50;

/// Job indices per machine, in processing order
type Plan = Vec<Vec<usize>>;

/// Assign jobs to parallel identical machines, minimizing makespan.
///
/// `heuristic` is longest-processing-time first onto the least-loaded
/// machine. `constraint_satisfaction` and `reinforcement_learning` refine that
/// plan with single-job moves off the busiest machine; both are heuristic
/// approximations. The result is never worse than the round-robin baseline.
pub fn optimize_schedule(request: &ScheduleRequest) -> Result<ScheduleResult> {
    let algorithm: ScheduleAlgorithm = request.algorithm.parse()?;
    if request.machine_count == 0 {
        return Err(Error::InvalidConfig("machine_count must be at least 1".to_string()));
    }
    if let Some(job) = request
        .jobs
        .iter()
        .find(|j| !j.duration_minutes.is_finite() || j.duration_minutes < 0.0)
    {
        return Err(Error::InvalidConfig(format!(
            "job {} has invalid duration {}",
            job.job_id, job.duration_minutes
        )));
    }

    let durations: Vec<f64> = request.jobs.iter().map(|j| j.duration_minutes).collect();
    let machines = request.machine_count;

    let baseline = round_robin(durations.len(), machines);
    let mut plan = longest_first(&durations, machines);
    if algorithm != ScheduleAlgorithm::Heuristic {
        improve_by_moves(&mut plan, &durations);
    }

    let original_makespan = makespan(&baseline, &durations);
    if makespan(&plan, &durations) > original_makespan {
        plan = baseline;
    }
    let optimized_makespan = makespan(&plan, &durations);
    let improvement_percent = if original_makespan > 0.0 {
        (original_makespan - optimized_makespan) / original_makespan * 100.0
    } else {
        0.0
    };

    let mut jobs = Vec::with_capacity(durations.len());
    let mut utilization = Vec::with_capacity(machines);
    for (machine, queue) in plan.iter().enumerate() {
        let mut clock = 0.0;
        for &job in queue {
            jobs.push(JobAssignment {
                job_id: request.jobs[job].job_id.clone(),
                machine_id: machine + 1,
                start_minute: clock,
                end_minute: clock + durations[job],
            });
            clock += durations[job];
        }
        utilization.push(MachineUtilization {
            machine_id: machine + 1,
            utilization: if optimized_makespan > 0.0 {
                clock / optimized_makespan
            } else {
                0.0
            },
        });
    }

    info!(
        process_id = %request.process_id,
        algorithm = algorithm.as_str(),
        jobs = durations.len(),
        machines,
        original_makespan,
        optimized_makespan,
        "Schedule optimized"
    );

    Ok(ScheduleResult {
        optimization_id: Uuid::now_v7().to_string(),
        process_id: request.process_id.clone(),
        algorithm: algorithm.as_str().to_string(),
        original_makespan,
        optimized_makespan,
        improvement_percent,
        jobs,
        machines: utilization,
    })
}

fn round_robin(jobs: usize, machines: usize) -> Plan {
    let mut plan = vec![Vec::new(); machines];
    for job in 0..jobs {
        plan[job % machines].push(job);
    }
    plan
}

fn longest_first(durations: &[f64], machines: usize) -> Plan {
    let mut order: Vec<usize> = (0..durations.len()).collect();
    // Stable sort keeps submission order among equal durations
    order.sort_by(|&a, &b| durations[b].total_cmp(&durations[a]));

    let mut plan = vec![Vec::new(); machines];
    let mut loads = vec![0.0; machines];
    for job in order {
        let machine = least_loaded(&loads);
        plan[machine].push(job);
        loads[machine] += durations[job];
    }
    plan
}

fn least_loaded(loads: &[f64]) -> usize {
    loads
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn loads(plan: &Plan, durations: &[f64]) -> Vec<f64> {
    plan.iter()
        .map(|queue| queue.iter().map(|&j| durations[j]).sum())
        .collect()
}

fn makespan(plan: &Plan, durations: &[f64]) -> f64 {
    loads(plan, durations).into_iter().fold(0.0, f64::max)
}

/// Move single jobs off the busiest machine while that shortens the makespan
fn improve_by_moves(plan: &mut Plan, durations: &[f64]) {
    let max_moves = durations.len() * MOVES_PER_JOB;
    for _ in 0..max_moves {
        let machine_loads = loads(plan, durations);
        let current = machine_loads.iter().copied().fold(0.0, f64::max);
        let busiest = machine_loads
            .iter()
            .position(|&l| l == current)
            .unwrap_or(0);

        let mut best_move: Option<(usize, usize, f64)> = None;
        for (slot, &job) in plan[busiest].iter().enumerate() {
            for (target, &load) in machine_loads.iter().enumerate() {
                if target == busiest {
                    continue;
                }
                let mut after = machine_loads.clone();
                after[busiest] -= durations[job];
                after[target] = load + durations[job];
                let new_makespan = after.into_iter().fold(0.0, f64::max);
                if new_makespan < current && best_move.map_or(true, |(_, _, m)| new_makespan < m) {
                    best_move = Some((slot, target, new_makespan));
                }
            }
        }

        match best_move {
            Some((slot, target, _)) => {
                let job = plan[busiest].remove(slot);
                plan[target].push(job);
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::types::ScheduleJob;

    fn request(algorithm: &str, machines: usize, durations: &[f64]) -> ScheduleRequest {
        ScheduleRequest {
            process_id: "line-1".to_string(),
            algorithm: algorithm.to_string(),
            machine_count: machines,
            jobs: durations
                .iter()
                .enumerate()
                .map(|(i, &d)| ScheduleJob {
                    job_id: format!("job-{}", i + 1),
                    duration_minutes: d,
                })
                .collect(),
        }
    }

    #[test]
    fn test_longest_first_beats_round_robin() {
        // Round robin: machine 1 gets 90 + 90, machine 2 gets 10 + 10
        let result = optimize_schedule(&request("heuristic", 2, &[90.0, 10.0, 90.0, 10.0])).unwrap();
        assert_eq!(result.original_makespan, 180.0);
        assert_eq!(result.optimized_makespan, 100.0);
        assert!((result.improvement_percent - 44.444).abs() < 0.01);
        assert_eq!(result.jobs.len(), 4);
        assert!(result.machines.iter().all(|m| m.utilization == 1.0));
    }

    #[test]
    fn test_assignments_are_sequential_per_machine() {
        let result = optimize_schedule(&request("constraint_satisfaction", 3, &[30.0, 20.0, 50.0, 10.0, 40.0])).unwrap();
        for machine in 1..=3 {
            let mut clock = 0.0;
            for job in result.jobs.iter().filter(|j| j.machine_id == machine) {
                assert_eq!(job.start_minute, clock);
                clock = job.end_minute;
            }
            assert!(clock <= result.optimized_makespan);
        }
        assert!(result.optimized_makespan <= result.original_makespan);
    }

    #[test]
    fn test_local_search_never_worse_than_heuristic() {
        let durations = [7.0, 7.0, 6.0, 6.0, 5.0, 5.0, 4.0, 4.0, 4.0];
        let heuristic = optimize_schedule(&request("heuristic", 3, &durations)).unwrap();
        let refined = optimize_schedule(&request("reinforcement_learning", 3, &durations)).unwrap();
        assert!(refined.optimized_makespan <= heuristic.optimized_makespan);
    }

    #[test]
    fn test_empty_job_list() {
        let result = optimize_schedule(&request("heuristic", 2, &[])).unwrap();
        assert_eq!(result.original_makespan, 0.0);
        assert_eq!(result.improvement_percent, 0.0);
        assert!(result.jobs.is_empty());
        assert_eq!(result.machines.len(), 2);
    }

    #[test]
    fn test_invalid_requests() {
        assert!(matches!(
            optimize_schedule(&request("heuristic", 0, &[1.0])),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            optimize_schedule(&request("heuristic", 2, &[-1.0])),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            optimize_schedule(&request("grid_search", 2, &[1.0])),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }
}
