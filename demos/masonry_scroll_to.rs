// Example: a three-lane masonry layout with measured items and a scroll-to that settles over frames.
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use virtual_lanes::{
    Align, FrameCallback, ItemResizeCallback, OffsetCallback, OffsetChange, Rect, RectCallback,
    ScrollToFnOptions, ScrollToOptions, Unsubscribe, Virtualizer, VirtualizerOptions,
};

type V = Virtualizer<u32, usize>;

#[derive(Default)]
struct Host {
    offset: f64,
    offset_listener: Option<Rc<dyn Fn(OffsetChange)>>,
    frames: VecDeque<FrameCallback>,
}

fn card_height(index: usize) -> f64 {
    80.0 + ((index * 37) % 5) as f64 * 30.0
}

fn main() {
    let host = Rc::new(RefCell::new(Host::default()));

    let options = VirtualizerOptions::new(
        500,
        |_| 100.0,
        || Some(1),
        {
            let host = Rc::clone(&host);
            move |to: f64, opts: ScrollToFnOptions, _: &V| {
                let offset = to + opts.adjustments.unwrap_or(0.0);
                let listener = {
                    let mut host = host.borrow_mut();
                    host.offset = offset;
                    host.offset_listener.clone()
                };
                if let Some(listener) = listener {
                    listener(OffsetChange::new(offset, false));
                }
            }
        },
        |_: &V, on_rect: RectCallback| {
            on_rect(Rect::new(900.0, 600.0));
            let unsubscribe: Unsubscribe = Box::new(|| {});
            Ok(unsubscribe)
        },
        {
            let host = Rc::clone(&host);
            move |_: &V, on_offset: OffsetCallback| {
                let on_offset: Rc<dyn Fn(OffsetChange)> = Rc::from(on_offset);
                let offset = host.borrow().offset;
                on_offset(OffsetChange::new(offset, false));
                host.borrow_mut().offset_listener = Some(on_offset);
                let host = Rc::clone(&host);
                let unsubscribe: Unsubscribe = Box::new(move || {
                    host.borrow_mut().offset_listener = None;
                });
                Ok(unsubscribe)
            }
        },
    )
    .with_lanes(3)
    .with_gap(8.0)
    // Element ids are the item indexes; the "real" height is a function of it.
    .with_measure_element(Some(|element: &usize, _: &V| card_height(*element)))
    .with_observe_item_element(Some(|_: &usize, _: ItemResizeCallback| {
        let unsubscribe: Unsubscribe = Box::new(|| {});
        unsubscribe
    }))
    .with_request_frame(Some({
        let host = Rc::clone(&host);
        move |callback: FrameCallback| host.borrow_mut().frames.push_back(callback)
    }));

    let v = Virtualizer::new(options);
    if let Err(err) = v.did_mount() {
        eprintln!("mount failed: {err}");
        return;
    }

    // "Render": every rendered card reports its element so it gets measured.
    let render = |v: &V| {
        for item in v.get_virtual_items().iter() {
            v.measure_element(item.index, Some(item.index));
        }
    };
    render(&v);
    println!(
        "measured={} total={} lanes_of_first_row={:?}",
        v.measurement_cache_len(),
        v.get_total_size(),
        v.get_virtual_items()
            .iter()
            .take(3)
            .map(|it| it.lane)
            .collect::<Vec<_>>()
    );

    let handle = v.scroll_to_index(250, ScrollToOptions::default().with_align(Align::Start));
    println!("scroll_to_index(250): {:?}", handle.status());

    // Drive the frame loop; each frame the host renders and measures what became visible.
    let mut frames = 0;
    loop {
        let next = host.borrow_mut().frames.pop_front();
        let Some(frame) = next else { break };
        render(&v);
        frame();
        frames += 1;
    }
    println!(
        "after {frames} frames: status={:?} offset={} item_250_start={:?}",
        handle.status(),
        v.scroll_offset(),
        v.measurement(250).map(|m| m.start)
    );

    // Tear down with a scroll still pending: nothing runs afterwards.
    let pending = v.scroll_to_index(10, ScrollToOptions::default());
    v.unmount();
    let leftover = host.borrow_mut().frames.drain(..).collect::<Vec<_>>();
    for frame in leftover {
        frame();
    }
    println!("after unmount: {:?}", pending.status());
}
