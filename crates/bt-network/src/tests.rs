//! Tests for topology validation, generators, and presets.

use std::io::Cursor;

use bt_core::{RouteId, SimTime, StopId, Stream, StreamRng, TerminalId};

use crate::{
    ArrivalProcess, DemandModel, DemandProfile, DispatchSpec, NetworkBuilder, NetworkError, Node,
    OdDemand, OdTable, QueueRule, RouteSpec, StopLayout, TravelTimeModel, TravelTimeSpec, VirtualSchedule,
    load_od_reader, presets,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn fixed(secs: f64) -> TravelTimeSpec {
    TravelTimeSpec::Deterministic { secs }
}

fn every(headway_secs: f64) -> DispatchSpec {
    DispatchSpec::Headway { first_secs: 0.0, headway_secs }
}

/// origin → n stops → destination, every link 100 m / 10 s.
fn line(n: usize) -> (NetworkBuilder, TerminalId, Vec<StopId>, TerminalId) {
    let mut b = NetworkBuilder::new("line");
    let o = b.add_terminal("o");
    let stops: Vec<StopId> = (0..n).map(|i| b.add_stop(format!("s{i}"))).collect();
    let d = b.add_terminal("d");
    let mut prev = Node::Terminal(o);
    for &s in &stops {
        b.add_link(prev, Node::Stop(s), 100.0, fixed(10.0));
        prev = Node::Stop(s);
    }
    b.add_link(prev, Node::Terminal(d), 100.0, fixed(10.0));
    (b, o, stops, d)
}

fn rng(seed: u64) -> StreamRng {
    StreamRng::new(seed, Stream::Demand(RouteId(0), StopId(0)))
}

// ── Builder validation ────────────────────────────────────────────────────────

#[cfg(test)]
mod builder_tests {
    use super::*;

    #[test]
    fn valid_line_builds() {
        let (mut b, o, stops, d) = line(3);
        let r = b.add_route(RouteSpec::new("r", o, stops.clone(), d, every(300.0)));
        let net = b.build().unwrap();

        assert_eq!(net.stop_sequence(r), stops.as_slice());
        assert_eq!(net.route_links(r).len(), 4);
        assert_eq!(net.stop_offset_m(r, 0), 100.0);
        assert_eq!(net.stop_offset_m(r, 2), 300.0);
        assert_eq!(net.stop_offset_m(r, 3), 400.0);
        assert_eq!(net.routes_serving(stops[1]), vec![r]);
    }

    #[test]
    fn no_routes_is_error() {
        let (b, ..) = line(1);
        assert!(matches!(b.build(), Err(NetworkError::Config(_))));
    }

    #[test]
    fn empty_route_is_error() {
        let (mut b, o, _, d) = line(1);
        b.add_route(RouteSpec::new("r", o, vec![], d, every(300.0)));
        assert!(matches!(b.build(), Err(NetworkError::EmptyRoute(_))));
    }

    #[test]
    fn repeated_stop_is_cyclic() {
        let (mut b, o, stops, d) = line(2);
        b.add_route(RouteSpec::new("r", o, vec![stops[0], stops[1], stops[0]], d, every(300.0)));
        assert!(matches!(b.build(), Err(NetworkError::CyclicRoute { stop, .. }) if stop == stops[0]));
    }

    #[test]
    fn unknown_stop_is_error() {
        let (mut b, o, _, d) = line(1);
        b.add_route(RouteSpec::new("r", o, vec![StopId(99)], d, every(300.0)));
        assert!(matches!(b.build(), Err(NetworkError::UnknownStop { .. })));
    }

    #[test]
    fn unknown_terminal_is_error() {
        let (mut b, o, stops, _) = line(1);
        b.add_route(RouteSpec::new("r", o, stops, TerminalId(42), every(300.0)));
        assert!(matches!(b.build(), Err(NetworkError::UnknownTerminal { .. })));
    }

    #[test]
    fn missing_link_is_error() {
        let (mut b, o, stops, d) = line(3);
        // Skips stop 1: there is no link s0 → s2.
        b.add_route(RouteSpec::new("r", o, vec![stops[0], stops[2]], d, every(300.0)));
        assert!(matches!(b.build(), Err(NetworkError::MissingLink { .. })));
    }

    #[test]
    fn duplicate_link_is_error() {
        let (mut b, o, stops, d) = line(1);
        b.add_link(Node::Terminal(o), Node::Stop(stops[0]), 50.0, fixed(5.0));
        b.add_route(RouteSpec::new("r", o, stops, d, every(300.0)));
        assert!(matches!(b.build(), Err(NetworkError::Config(_))));
    }

    #[test]
    fn hold_stop_off_route_is_error() {
        let (mut b, o, stops, d) = line(2);
        let extra = b.add_stop("elsewhere");
        b.add_route(RouteSpec::new("r", o, stops, d, every(300.0)).hold_stops(vec![extra]));
        assert!(matches!(b.build(), Err(NetworkError::UnknownStop { stop, .. }) if stop == extra));
    }

    #[test]
    fn bad_distribution_is_error() {
        let (mut b, o, stops, d) = line(1);
        b.add_link(
            Node::Stop(stops[0]),
            Node::Stop(stops[0]),
            10.0,
            TravelTimeSpec::Normal { mean_secs: f64::NAN, cv: 0.1, min_secs: 0.0 },
        );
        b.add_route(RouteSpec::new("r", o, stops, d, every(300.0)));
        assert!(matches!(b.build(), Err(NetworkError::Distribution { .. })));
    }

    #[test]
    fn lognormal_needs_positive_mean() {
        let spec = TravelTimeSpec::LogNormal { mean_secs: 0.0, cv: 0.3, min_secs: 0.0 };
        assert!(spec.sampler("l").is_err());
    }

    #[test]
    fn non_positive_headway_is_error() {
        let (mut b, o, stops, d) = line(1);
        b.add_route(RouteSpec::new("r", o, stops, d, every(0.0)));
        assert!(matches!(b.build(), Err(NetworkError::Config(_))));
    }

    #[test]
    fn duplicate_timetable_entry_is_error() {
        let (mut b, o, stops, d) = line(1);
        b.add_route(RouteSpec::new("r", o, stops, d, DispatchSpec::Timetable(vec![0.0, 60.0, 60.0])));
        assert!(matches!(b.build(), Err(NetworkError::Config(_))));
    }

    #[test]
    fn stop_layout_defaults_to_single_berth() {
        let (mut b, o, mut stops, d) = line(1);
        let bay = b.add_stop_with("bay", StopLayout::new(3, QueueRule::FreeOvertaking).with_holding_area());
        b.add_link(Node::Stop(stops[0]), Node::Stop(bay), 100.0, fixed(10.0));
        b.add_link(Node::Stop(bay), Node::Terminal(d), 100.0, fixed(10.0));
        stops.push(bay);
        b.add_route(RouteSpec::new("r", o, stops.clone(), d, every(300.0)));
        let net = b.build().unwrap();

        assert_eq!(net.stop(stops[0]).unwrap().layout, StopLayout::default());
        let layout = net.stop(bay).unwrap().layout;
        assert_eq!((layout.berths, layout.rule, layout.holding_area), (3, QueueRule::FreeOvertaking, true));
    }

    #[test]
    fn stop_without_berths_is_error() {
        let (mut b, o, stops, d) = line(1);
        b.add_stop_with("nowhere", StopLayout::new(0, QueueRule::Fifo));
        b.add_route(RouteSpec::new("r", o, stops, d, every(300.0)));
        assert!(matches!(b.build(), Err(NetworkError::Config(_))));
    }

    #[test]
    fn zero_capacity_is_error() {
        let (mut b, o, stops, d) = line(1);
        b.add_route(RouteSpec::new("r", o, stops, d, every(300.0)).capacity(0));
        assert!(matches!(b.build(), Err(NetworkError::Config(_))));
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod dispatch_tests {
    use super::*;

    #[test]
    fn headway_times_stop_before_horizon() {
        let times = every(300.0).times(SimTime::from_secs(1200));
        assert_eq!(times, vec![SimTime::ZERO, SimTime::from_secs(300), SimTime::from_secs(600), SimTime::from_secs(900)]);
    }

    #[test]
    fn timetable_is_cut_at_horizon() {
        let spec = DispatchSpec::Timetable(vec![10.0, 20.0, 30.0, 40.0]);
        assert_eq!(spec.times(SimTime::from_secs(30)).len(), 2);
        assert_eq!(spec.headway_secs(), 10.0);
    }

    #[test]
    fn network_exposes_dispatch_times() {
        let net = presets::single_stop(300.0, 0.0, 60.0).unwrap();
        let r = net.routes()[0].id;
        assert_eq!(net.dispatch_times(r, SimTime::from_secs(3600)).len(), 12);
        assert!(net.dispatch_times(RouteId(7), SimTime::from_secs(3600)).is_empty());
    }
}

// ── Demand ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod demand_tests {
    use super::*;

    fn one_pair(rate: f64, profile: DemandProfile, process: ArrivalProcess) -> OdDemand {
        let mut od = OdTable::new();
        od.insert(RouteId(0), StopId(0), Node::Terminal(TerminalId(1)), rate);
        OdDemand::new(od, profile, process).unwrap()
    }

    #[test]
    fn poisson_mean_is_near_rate() {
        let demand = one_pair(0.1, DemandProfile::flat(), ArrivalProcess::Poisson);
        let mut r = rng(7);
        let horizon = SimTime::from_secs(100_000);
        let mut t = SimTime::ZERO;
        let mut n = 0u32;
        while let Some(a) = demand.next_arrival(RouteId(0), StopId(0), t, &mut r) {
            assert!(a.at > t);
            if a.at > horizon {
                break;
            }
            t = a.at;
            n += 1;
        }
        // Expect 10 000 with std 100.
        assert!((9_500..=10_500).contains(&n), "got {n} arrivals");
    }

    #[test]
    fn same_seed_same_stream() {
        let demand = one_pair(0.05, DemandProfile::flat(), ArrivalProcess::Poisson);
        let draw = |seed| {
            let mut r = rng(seed);
            let mut t = SimTime::ZERO;
            let mut out = Vec::new();
            for _ in 0..20 {
                let a = demand.next_arrival(RouteId(0), StopId(0), t, &mut r).unwrap();
                t = a.at;
                out.push(t);
            }
            out
        };
        assert_eq!(draw(1), draw(1));
        assert_ne!(draw(1), draw(2));
    }

    #[test]
    fn deterministic_arrivals_are_evenly_spaced() {
        let demand = one_pair(0.5, DemandProfile::flat(), ArrivalProcess::Deterministic);
        let mut r = rng(0);
        let a = demand.next_arrival(RouteId(0), StopId(0), SimTime::ZERO, &mut r).unwrap();
        let b = demand.next_arrival(RouteId(0), StopId(0), a.at, &mut r).unwrap();
        assert_eq!(a.at, SimTime::from_secs(2));
        assert_eq!(b.at, SimTime::from_secs(4));
        assert_eq!(a.destination, Node::Terminal(TerminalId(1)));
    }

    #[test]
    fn zero_rate_segment_is_skipped() {
        let profile = DemandProfile::new(vec![(0.0, 0.0), (100.0, 1.0)]).unwrap();
        let det = one_pair(1.0, profile.clone(), ArrivalProcess::Deterministic);
        let a = det.next_arrival(RouteId(0), StopId(0), SimTime::ZERO, &mut rng(0)).unwrap();
        assert_eq!(a.at, SimTime::from_secs(101));

        let poisson = one_pair(1.0, profile, ArrivalProcess::Poisson);
        let a = poisson.next_arrival(RouteId(0), StopId(0), SimTime::ZERO, &mut rng(3)).unwrap();
        assert!(a.at > SimTime::from_secs(100));
    }

    #[test]
    fn trailing_zero_profile_exhausts_stream() {
        let profile = DemandProfile::new(vec![(0.0, 1.0), (50.0, 0.0)]).unwrap();
        let det = one_pair(0.01, profile.clone(), ArrivalProcess::Deterministic);
        assert!(det.next_arrival(RouteId(0), StopId(0), SimTime::from_secs(60), &mut rng(0)).is_none());
        assert_eq!(det.rate(RouteId(0), StopId(0), SimTime::from_secs(10)), 0.01);
        assert_eq!(det.rate(RouteId(0), StopId(0), SimTime::from_secs(60)), 0.0);
    }

    #[test]
    fn malformed_profile_is_error() {
        assert!(DemandProfile::new(vec![]).is_err());
        assert!(DemandProfile::new(vec![(5.0, 1.0)]).is_err());
        assert!(DemandProfile::new(vec![(0.0, 1.0), (0.0, 2.0)]).is_err());
        assert!(DemandProfile::new(vec![(0.0, -1.0)]).is_err());
    }

    #[test]
    fn negative_rate_is_error() {
        let mut od = OdTable::new();
        od.insert(RouteId(0), StopId(0), Node::Stop(StopId(1)), -0.1);
        assert!(matches!(
            OdDemand::new(od, DemandProfile::flat(), ArrivalProcess::Poisson),
            Err(NetworkError::Distribution { .. })
        ));
    }

    #[test]
    fn upstream_destination_fails_validation() {
        let (mut b, o, stops, d) = line(3);
        let r = b.add_route(RouteSpec::new("r", o, stops.clone(), d, every(300.0)));
        let mut od = OdTable::new();
        od.insert(r, stops[2], Node::Stop(stops[0]), 0.1);
        b.demand(OdDemand::new(od, DemandProfile::flat(), ArrivalProcess::Poisson).unwrap());
        assert!(matches!(b.build(), Err(NetworkError::Config(_))));
    }

    #[test]
    fn destinations_follow_weights() {
        let mut od = OdTable::new();
        od.insert(RouteId(0), StopId(0), Node::Stop(StopId(1)), 0.09);
        od.insert(RouteId(0), StopId(0), Node::Stop(StopId(2)), 0.01);
        let demand = OdDemand::new(od, DemandProfile::flat(), ArrivalProcess::Poisson).unwrap();
        let mut r = rng(11);
        let mut t = SimTime::ZERO;
        let mut near = 0;
        for _ in 0..2000 {
            let a = demand.next_arrival(RouteId(0), StopId(0), t, &mut r).unwrap();
            t = a.at;
            if a.destination == Node::Stop(StopId(1)) {
                near += 1;
            }
        }
        assert!((1700..=1900).contains(&near), "got {near}");
    }
}

// ── Travel time ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod travel_tests {
    use super::*;
    use bt_core::{BusId, LinkId};

    #[test]
    fn samples_respect_floor() {
        let s = TravelTimeSpec::Normal { mean_secs: 10.0, cv: 2.0, min_secs: 3.0 }
            .sampler("l")
            .unwrap();
        let mut r = StreamRng::new(5, Stream::Link(LinkId(0)));
        for _ in 0..1000 {
            assert!(s.sample_secs(BusId(0), SimTime::ZERO, &mut r) >= 3.0);
        }
        assert_eq!(s.mean_secs(), 10.0);
    }

    #[test]
    fn lognormal_mean_is_close() {
        let s = TravelTimeSpec::LogNormal { mean_secs: 50.0, cv: 0.2, min_secs: 0.0 }
            .sampler("l")
            .unwrap();
        let mut r = StreamRng::new(9, Stream::Link(LinkId(3)));
        let n = 20_000;
        let mean = (0..n).map(|_| s.sample_secs(BusId(0), SimTime::ZERO, &mut r)).sum::<f64>() / n as f64;
        assert!((mean - 50.0).abs() < 1.0, "mean {mean}");
    }
}

// ── Virtual schedule ──────────────────────────────────────────────────────────

#[cfg(test)]
mod schedule_tests {
    use super::*;

    #[test]
    fn single_stop_offsets() {
        let net = presets::single_stop(300.0, 0.01, 60.0).unwrap();
        let vs = VirtualSchedule::perfect(&net, 10.0);
        let o = vs.offsets(RouteId(0), 0).unwrap();
        assert!((o.arrival_secs - 60.0).abs() < 1e-9);
        // 0.01 pax/s * 300 s * 2 s/pax
        assert!((o.ready_secs - 66.0).abs() < 1e-9);
        assert!((o.departure_secs - 76.0).abs() < 1e-9);
        assert!((vs.route(RouteId(0)).unwrap().end_secs - 136.0).abs() < 1e-9);
        assert_eq!(vs.demand_start(RouteId(0), 0), SimTime::from_secs(66));

        let s = vs.scheduled(RouteId(0), 0, SimTime::from_secs(600)).unwrap();
        assert_eq!(s.arrival, SimTime::from_secs(660));
        assert_eq!(s.departure, SimTime::from_secs(676));
    }

    #[test]
    fn offsets_are_monotone() {
        let net = presets::homogeneous_one_route().unwrap();
        let vs = VirtualSchedule::perfect(&net, 30.0);
        let stops = vs.route(RouteId(0)).unwrap().stops();
        assert_eq!(stops.len(), presets::HOMOGENEOUS_STOPS);
        let mut prev = 0.0;
        for o in stops {
            assert!(o.arrival_secs >= prev);
            assert!(o.ready_secs >= o.arrival_secs);
            assert!(o.departure_secs >= o.ready_secs);
            prev = o.departure_secs;
        }
    }

    #[test]
    fn per_stop_holds_shift_downstream_offsets() {
        let (mut b, o, stops, d) = line(3);
        let r = b.add_route(RouteSpec::new("r", o, stops, d, every(300.0)));
        let net = b.build().unwrap();

        let holds = [5.0, 20.0, 0.0];
        let vs = VirtualSchedule::with_holds(&net, |_, i| holds[i]);
        let deps: Vec<(f64, f64)> = vs
            .route(r)
            .unwrap()
            .stops()
            .iter()
            .map(|o| (o.arrival_secs, o.departure_secs))
            .collect();
        assert_eq!(deps, vec![(10.0, 15.0), (25.0, 45.0), (55.0, 55.0)]);
        assert_eq!(vs.route(r).unwrap().end_secs, 65.0);

        // Negative holds are floored.
        assert_eq!(VirtualSchedule::with_holds(&net, |_, _| -10.0), VirtualSchedule::perfect(&net, 0.0));
    }

    #[test]
    fn dwell_uses_rate_at_time_zero() {
        let (mut b, o, stops, d) = line(1);
        let r = b.add_route(RouteSpec::new("r", o, stops.clone(), d, every(300.0)));
        let mut od = OdTable::new();
        od.insert(r, stops[0], Node::Terminal(d), 0.01);
        // Triple demand from t = 5, before the virtual bus even arrives.
        let profile = DemandProfile::new(vec![(0.0, 1.0), (5.0, 3.0)]).unwrap();
        b.demand(OdDemand::new(od, profile, ArrivalProcess::Poisson).unwrap());
        let net = b.build().unwrap();

        let o = VirtualSchedule::perfect(&net, 0.0).offsets(r, 0).unwrap();
        // 0.01 pax/s * 300 s * 2 s/pax, unscaled.
        assert!((o.ready_secs - o.arrival_secs - 6.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_route_has_no_schedule() {
        let net = presets::single_stop(300.0, 0.0, 60.0).unwrap();
        let vs = VirtualSchedule::perfect(&net, 0.0);
        assert!(vs.scheduled(RouteId(3), 0, SimTime::ZERO).is_none());
        assert_eq!(vs.demand_start(RouteId(3), 0), SimTime::ZERO);
    }
}

// ── CSV loader ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod loader_tests {
    use super::*;

    #[test]
    fn parses_stops_and_terminals() {
        let csv = "route,origin,destination,rate_per_hour\n0,0,2,36\n0,0,t1,72\n0,0,2,36\n";
        let table = load_od_reader(Cursor::new(csv)).unwrap();
        let dests = table.destinations(RouteId(0), StopId(0));
        assert_eq!(dests.len(), 2);
        assert_eq!(dests[0], (Node::Stop(StopId(2)), 0.02));
        assert_eq!(dests[1], (Node::Terminal(TerminalId(1)), 0.02));
    }

    #[test]
    fn bad_destination_is_parse_error() {
        let csv = "route,origin,destination,rate_per_hour\n0,0,home,10\n";
        assert!(matches!(load_od_reader(Cursor::new(csv)), Err(NetworkError::Parse(_))));
    }

    #[test]
    fn negative_rate_is_parse_error() {
        let csv = "route,origin,destination,rate_per_hour\n0,0,1,-3\n";
        assert!(matches!(load_od_reader(Cursor::new(csv)), Err(NetworkError::Parse(_))));
    }
}

// ── Presets ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod preset_tests {
    use super::*;

    #[test]
    fn presets_build() {
        let h = presets::homogeneous_one_route().unwrap();
        assert_eq!(h.routes().len(), 1);
        assert_eq!(h.stops().len(), presets::HOMOGENEOUS_STOPS);

        let m = presets::merging_corridor().unwrap();
        assert_eq!(m.routes().len(), 2);
        let trunk_start = m.routes()[0].stops[presets::MERGE_BRANCH_STOPS];
        assert_eq!(m.routes_serving(trunk_start).len(), 2);
        assert!(!m.routes()[0].is_hold_stop(m.routes()[0].stops[0]));
        assert!(m.routes()[0].is_hold_stop(trunk_start));
    }
}
